use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub explanation: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
	pub p50_ms: u64,
	pub p95_ms: u64,
	pub p99_ms: u64,
}

/// One phrase's outcome inside an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPhraseExecution {
	pub position: i32,
	pub phrase: String,
	pub results: Vec<SearchHit>,
	pub total_results: Option<u64>,
	pub took_ms: Option<u64>,
	/// Set when the phrase failed outright or the backend reported a degraded response.
	pub error: Option<String>,
	/// `None` when the phrase produced no scores.
	pub combined_score: Option<f64>,
	pub scores: BTreeMap<String, f64>,
}
impl SearchPhraseExecution {
	pub fn is_scored(&self) -> bool {
		self.combined_score.is_some()
	}
}

/// Everything the orchestrator computed for one run, before the store assigns identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecution {
	pub search_configuration_id: Uuid,
	pub combined_score: f64,
	pub all_scores: BTreeMap<String, f64>,
	pub latency: Option<LatencyPercentiles>,
	pub scored_phrase_count: u32,
	pub errored_phrase_count: u32,
	pub phrases: Vec<SearchPhraseExecution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
	pub execution_id: Uuid,
	pub search_configuration_id: Uuid,
	pub combined_score: f64,
	pub all_scores: BTreeMap<String, f64>,
	pub latency: Option<LatencyPercentiles>,
	pub phrase_count: u32,
	pub scored_phrase_count: u32,
	pub errored_phrase_count: u32,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub phrases: Vec<SearchPhraseExecution>,
}
impl Execution {
	pub fn from_new(execution_id: Uuid, created_at: OffsetDateTime, new: NewExecution) -> Self {
		Self {
			execution_id,
			search_configuration_id: new.search_configuration_id,
			combined_score: new.combined_score,
			all_scores: new.all_scores,
			latency: new.latency,
			phrase_count: new.phrases.len() as u32,
			scored_phrase_count: new.scored_phrase_count,
			errored_phrase_count: new.errored_phrase_count,
			created_at,
			phrases: new.phrases,
		}
	}
}
