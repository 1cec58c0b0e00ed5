pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Configuration integrity error: {message}")]
	ConfigurationIntegrity { message: String },
	#[error("Unsupported search endpoint type {endpoint_type:?}.")]
	UnsupportedEndpoint { endpoint_type: String },
	#[error("Query expansion failed: {message}")]
	QueryExpansion { message: String },
	#[error("Backend error: {message}")]
	Backend { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Execution aborted: {message}")]
	Aborted { message: String },
}
impl From<relq_storage::Error> for Error {
	fn from(err: relq_storage::Error) -> Self {
		match err {
			relq_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			relq_storage::Error::SerdeJson(inner) => Self::Storage { message: inner.to_string() },
			relq_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			relq_storage::Error::NotFound(message) => Self::NotFound { message },
			relq_storage::Error::Conflict(message) => Self::Storage { message },
		}
	}
}

impl From<relq_providers::Error> for Error {
	fn from(err: relq_providers::Error) -> Self {
		match err {
			relq_providers::Error::UnsupportedEndpoint { endpoint_type } =>
				Self::UnsupportedEndpoint { endpoint_type },
			relq_providers::Error::QueryExpansionFailed { message } =>
				Self::QueryExpansion { message },
			relq_providers::Error::InvalidHeaderName(_)
			| relq_providers::Error::InvalidHeaderValue(_)
			| relq_providers::Error::InvalidConfig { .. } =>
				Self::InvalidRequest { message: err.to_string() },
			relq_providers::Error::Backend { .. }
			| relq_providers::Error::Reqwest(_)
			| relq_providers::Error::SerdeJson(_)
			| relq_providers::Error::InvalidResponse { .. } =>
				Self::Backend { message: err.to_string() },
		}
	}
}

impl From<relq_domain::Error> for Error {
	fn from(err: relq_domain::Error) -> Self {
		match err {
			relq_domain::Error::UnsupportedEndpoint { endpoint_type } =>
				Self::UnsupportedEndpoint { endpoint_type },
			relq_domain::Error::InvalidWeight { .. } =>
				Self::ConfigurationIntegrity { message: err.to_string() },
			relq_domain::Error::InvalidInstruction { .. } =>
				Self::QueryExpansion { message: err.to_string() },
			relq_domain::Error::UnknownMetric { .. } =>
				Self::InvalidRequest { message: err.to_string() },
		}
	}
}
