pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unsupported search endpoint type {endpoint_type:?}.")]
	UnsupportedEndpoint { endpoint_type: String },
	#[error("Query expansion failed: {message}")]
	QueryExpansionFailed { message: String },
	#[error("Backend returned HTTP {status}: {message}")]
	Backend { status: u16, message: String },
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl From<relq_domain::Error> for Error {
	fn from(err: relq_domain::Error) -> Self {
		match err {
			relq_domain::Error::UnsupportedEndpoint { endpoint_type } =>
				Self::UnsupportedEndpoint { endpoint_type },
			invalid @ relq_domain::Error::InvalidInstruction { .. } =>
				Self::QueryExpansionFailed { message: invalid.to_string() },
			other => Self::InvalidConfig { message: other.to_string() },
		}
	}
}
