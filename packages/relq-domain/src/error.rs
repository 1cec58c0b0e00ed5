pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("Judgement set {judgement_set_id} has invalid weight {weight}; it must be positive.")]
	InvalidWeight { judgement_set_id: uuid::Uuid, weight: f64 },
	#[error("Unsupported search endpoint type {endpoint_type:?}.")]
	UnsupportedEndpoint { endpoint_type: String },
	#[error("Unknown metric {label:?}.")]
	UnknownMetric { label: String },
	#[error("Invalid {kind} instruction: {message}")]
	InvalidInstruction { kind: &'static str, message: String },
}
