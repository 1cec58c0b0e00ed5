//! Side-by-side comparison of two executions.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use relq_domain::execution::Execution;

use crate::{RelqService, Result};

/// Deltas are always `candidate - baseline`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionComparison {
	pub baseline_execution_id: Uuid,
	pub candidate_execution_id: Uuid,
	pub combined_score_delta: f64,
	/// Only metrics present in both executions.
	pub metric_deltas: BTreeMap<String, f64>,
	pub latency_delta: Option<LatencyDelta>,
	pub phrases: Vec<PhraseDelta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyDelta {
	pub p50_ms: i64,
	pub p95_ms: i64,
	pub p99_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhraseDelta {
	pub phrase: String,
	pub baseline: Option<f64>,
	pub candidate: Option<f64>,
	/// `None` unless both sides were scored.
	pub delta: Option<f64>,
}

impl RelqService {
	pub async fn compare(
		&self,
		baseline_execution_id: Uuid,
		candidate_execution_id: Uuid,
	) -> Result<ExecutionComparison> {
		let baseline = self.execution(baseline_execution_id).await?;
		let candidate = self.execution(candidate_execution_id).await?;

		Ok(compare_executions(&baseline, &candidate))
	}
}

pub fn compare_executions(baseline: &Execution, candidate: &Execution) -> ExecutionComparison {
	let metric_deltas = baseline
		.all_scores
		.iter()
		.filter_map(|(label, before)| {
			candidate.all_scores.get(label).map(|after| (label.clone(), after - before))
		})
		.collect();
	let latency_delta =
		baseline.latency.zip(candidate.latency).map(|(before, after)| LatencyDelta {
			p50_ms: after.p50_ms as i64 - before.p50_ms as i64,
			p95_ms: after.p95_ms as i64 - before.p95_ms as i64,
			p99_ms: after.p99_ms as i64 - before.p99_ms as i64,
		});
	let mut joined: BTreeMap<&str, (Option<f64>, Option<f64>)> = BTreeMap::new();

	for phrase in &baseline.phrases {
		joined.entry(phrase.phrase.as_str()).or_default().0 = phrase.combined_score;
	}
	for phrase in &candidate.phrases {
		joined.entry(phrase.phrase.as_str()).or_default().1 = phrase.combined_score;
	}

	let phrases = joined
		.into_iter()
		.map(|(phrase, (before, after))| PhraseDelta {
			phrase: phrase.to_string(),
			baseline: before,
			candidate: after,
			delta: before.zip(after).map(|(before, after)| after - before),
		})
		.collect();

	ExecutionComparison {
		baseline_execution_id: baseline.execution_id,
		candidate_execution_id: candidate.execution_id,
		combined_score_delta: candidate.combined_score - baseline.combined_score,
		metric_deltas,
		latency_delta,
		phrases,
	}
}
