//! Progress notifications for running executions.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
	Started {
		search_configuration_id: Uuid,
		phrase_count: usize,
	},
	PhraseCompleted {
		search_configuration_id: Uuid,
		phrase: String,
		combined_score: Option<f64>,
		error: Option<String>,
	},
	Finished {
		search_configuration_id: Uuid,
		execution_id: Uuid,
		combined_score: f64,
	},
	/// The run stopped before anything was persisted.
	Failed {
		search_configuration_id: Uuid,
		message: String,
	},
}
impl ExecutionEvent {
	pub fn search_configuration_id(&self) -> Uuid {
		match self {
			Self::Started { search_configuration_id, .. }
			| Self::PhraseCompleted { search_configuration_id, .. }
			| Self::Finished { search_configuration_id, .. }
			| Self::Failed { search_configuration_id, .. } => *search_configuration_id,
		}
	}
}
