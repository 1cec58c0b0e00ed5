use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use relq_domain::{
	configuration::QueryTemplate,
	endpoint::SearchEndpoint,
	execution::{LatencyPercentiles, SearchPhraseExecution},
	ruleset::Ruleset,
};

use crate::Result;

#[derive(Debug, sqlx::FromRow)]
pub struct SearchEndpointRow {
	pub search_endpoint_id: Uuid,
	pub name: String,
	pub endpoint_type: String,
	pub base_url: String,
	pub index_name: String,
	pub credentials: Value,
}
impl SearchEndpointRow {
	pub fn into_domain(self) -> Result<SearchEndpoint> {
		Ok(SearchEndpoint {
			search_endpoint_id: self.search_endpoint_id,
			name: self.name,
			endpoint_type: self.endpoint_type,
			base_url: self.base_url,
			index: self.index_name,
			credentials: serde_json::from_value(self.credentials)?,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct QueryTemplateRow {
	pub template_id: Uuid,
	pub revision: i32,
	pub search_endpoint_id: Uuid,
	pub body: String,
	pub knobs: Value,
	pub ltr_model: Option<String>,
}
impl QueryTemplateRow {
	pub fn into_domain(self) -> Result<QueryTemplate> {
		Ok(QueryTemplate {
			template_id: self.template_id,
			revision: self.revision,
			search_endpoint_id: self.search_endpoint_id,
			body: self.body,
			knobs: serde_json::from_value(self.knobs)?,
			ltr_model: self.ltr_model,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct RulesetRow {
	pub ruleset_id: Uuid,
	pub version: i32,
	pub name: String,
	pub rules: Value,
}
impl RulesetRow {
	pub fn into_domain(self) -> Result<Ruleset> {
		Ok(Ruleset {
			ruleset_id: self.ruleset_id,
			version: self.version,
			name: self.name,
			rules: serde_json::from_value(self.rules)?,
		})
	}
}

/// One row of a judgement set outer-joined down to its votes.
#[derive(Debug, sqlx::FromRow)]
pub struct JudgementVoteRow {
	pub name: String,
	pub phrase: Option<String>,
	pub doc_id: Option<String>,
	pub score: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SearchConfigurationRow {
	pub search_configuration_id: Uuid,
	pub template_id: Uuid,
	pub template_revision: i32,
	pub knobs: Value,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ExecutionRow {
	pub execution_id: Uuid,
	pub search_configuration_id: Uuid,
	pub combined_score: f64,
	pub all_scores: Value,
	pub latency_p50_ms: Option<i64>,
	pub latency_p95_ms: Option<i64>,
	pub latency_p99_ms: Option<i64>,
	pub phrase_count: i32,
	pub scored_phrase_count: i32,
	pub errored_phrase_count: i32,
	pub created_at: OffsetDateTime,
}
impl ExecutionRow {
	pub fn latency(&self) -> Option<LatencyPercentiles> {
		Some(LatencyPercentiles {
			p50_ms: self.latency_p50_ms? as u64,
			p95_ms: self.latency_p95_ms? as u64,
			p99_ms: self.latency_p99_ms? as u64,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct PhraseExecutionRow {
	pub position: i32,
	pub phrase: String,
	pub results: Value,
	pub total_results: Option<i64>,
	pub took_ms: Option<i64>,
	pub error: Option<String>,
	pub combined_score: Option<f64>,
	pub scores: Value,
}
impl PhraseExecutionRow {
	pub fn into_domain(self) -> Result<SearchPhraseExecution> {
		Ok(SearchPhraseExecution {
			position: self.position,
			phrase: self.phrase,
			results: serde_json::from_value(self.results)?,
			total_results: self.total_results.map(|total| total as u64),
			took_ms: self.took_ms.map(|took| took as u64),
			error: self.error,
			combined_score: self.combined_score,
			scores: serde_json::from_value(self.scores)?,
		})
	}
}
