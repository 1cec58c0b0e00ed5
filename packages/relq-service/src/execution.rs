//! The execution orchestrator.
//!
//! A run loads everything it needs up front, evaluates every judged phrase against the live
//! backend with bounded parallelism, aggregates the per-phrase scores, and persists the result
//! in one write. Anything that goes wrong before the fan-out aborts the run without writing.

use std::{collections::BTreeMap, sync::Arc};

use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use relq_domain::{
	configuration::{QueryTemplate, SearchConfiguration},
	endpoint::BackendType,
	execution::{Execution, NewExecution, SearchPhraseExecution},
	judgement::CombinedJudgementPhrase,
	ruleset::Ruleset,
	scoring::Metric,
	stats,
};
use relq_providers::{QueryInterface, QueryResponse, expansion::QueryExpander};

use crate::{Error, ExecutionEvent, RelqService, Result};

/// Everything a phrase task needs, shared read-only across tasks.
struct PhrasePlan {
	backend: BackendType,
	template: QueryTemplate,
	knobs: BTreeMap<String, f64>,
	rulesets: Vec<Ruleset>,
	expander: QueryExpander,
	interface: Arc<dyn QueryInterface>,
	metrics: Vec<Metric>,
	combined_metric: Metric,
	relevance_threshold: f64,
}

struct RunContext {
	configuration: SearchConfiguration,
	plan: Arc<PhrasePlan>,
	judgements: Vec<CombinedJudgementPhrase>,
}

impl RelqService {
	/// Runs one evaluation of a search configuration and returns the persisted execution.
	pub async fn run_execution(&self, search_configuration_id: Uuid) -> Result<Execution> {
		let outcome = self.evaluate(search_configuration_id).await;

		match &outcome {
			Ok(execution) => {
				tracing::info!(
					%search_configuration_id,
					execution_id = %execution.execution_id,
					combined_score = execution.combined_score,
					scored = execution.scored_phrase_count,
					errored = execution.errored_phrase_count,
					"Execution finished."
				);

				self.publish(ExecutionEvent::Finished {
					search_configuration_id,
					execution_id: execution.execution_id,
					combined_score: execution.combined_score,
				});
			},
			Err(err) => {
				tracing::warn!(%search_configuration_id, error = %err, "Execution failed.");

				self.publish(ExecutionEvent::Failed {
					search_configuration_id,
					message: err.to_string(),
				});
			},
		}

		outcome
	}

	async fn evaluate(&self, search_configuration_id: Uuid) -> Result<Execution> {
		let context = self.load_context(search_configuration_id).await?;

		tracing::info!(
			%search_configuration_id,
			phrases = context.judgements.len(),
			backend = context.plan.backend.as_str(),
			"Execution started."
		);

		self.publish(ExecutionEvent::Started {
			search_configuration_id,
			phrase_count: context.judgements.len(),
		});

		let phrases = self.evaluate_phrases(&context).await?;
		let execution = aggregate(&context.configuration, &context.plan.metrics, phrases);

		self.store.persist_execution(execution).await
	}

	async fn load_context(&self, search_configuration_id: Uuid) -> Result<RunContext> {
		let configuration =
			self.store.search_configuration(search_configuration_id).await?.ok_or_else(|| {
				Error::NotFound {
					message: format!(
						"Search configuration {search_configuration_id} does not exist."
					),
				}
			})?;
		let template = self.store.query_template(&configuration).await?.ok_or_else(|| {
			Error::ConfigurationIntegrity {
				message: format!(
					"Search configuration {search_configuration_id} references missing query \
					 template {} revision {}.",
					configuration.template.template_id, configuration.template.revision
				),
			}
		})?;
		let endpoint = self.store.search_endpoint(&template).await?.ok_or_else(|| {
			Error::ConfigurationIntegrity {
				message: format!(
					"Query template {} references missing search endpoint {}.",
					template.template_id, template.search_endpoint_id
				),
			}
		})?;
		let backend = endpoint.backend_type()?;
		let rulesets = self.store.rulesets(&configuration).await?;

		if let Some(missing) = configuration.rulesets.iter().find(|wanted| {
			!rulesets.iter().any(|ruleset| {
				ruleset.ruleset_id == wanted.ruleset_id && ruleset.version == wanted.version
			})
		}) {
			return Err(Error::ConfigurationIntegrity {
				message: format!(
					"Search configuration {search_configuration_id} references missing ruleset {} \
					 version {}.",
					missing.ruleset_id, missing.version
				),
			});
		}

		let judgements = self.combined_judgements(&configuration).await?;
		let interface = self.backends.interface(&endpoint, backend)?;
		let metrics = self
			.cfg
			.evaluation
			.metrics
			.iter()
			.map(|label| label.parse::<Metric>())
			.collect::<relq_domain::Result<Vec<_>>>()?;
		let combined_metric = self.cfg.evaluation.combined_metric.parse::<Metric>()?;
		let knobs = template.resolve_knobs(&configuration.knobs);
		let plan = PhrasePlan {
			backend,
			template,
			knobs,
			rulesets,
			expander: self.expander.clone(),
			interface,
			metrics,
			combined_metric,
			relevance_threshold: self.cfg.evaluation.relevance_threshold,
		};

		Ok(RunContext { configuration, plan: Arc::new(plan), judgements })
	}

	/// Evaluates every phrase and returns the rows sorted by phrase, positions assigned.
	async fn evaluate_phrases(&self, context: &RunContext) -> Result<Vec<SearchPhraseExecution>> {
		let search_configuration_id = context.configuration.search_configuration_id;
		let semaphore = Arc::new(Semaphore::new(self.cfg.evaluation.concurrency.max(1) as usize));
		let mut tasks = JoinSet::new();

		for (index, phrase) in context.judgements.iter().cloned().enumerate() {
			let plan = Arc::clone(&context.plan);
			let semaphore = Arc::clone(&semaphore);

			tasks.spawn(async move {
				let _permit = semaphore.acquire_owned().await;

				(index, evaluate_phrase(&plan, phrase).await)
			});
		}

		let mut slots: Vec<Option<SearchPhraseExecution>> = vec![None; context.judgements.len()];

		while let Some(joined) = tasks.join_next().await {
			let (index, row) = joined.map_err(|err| Error::Aborted {
				message: format!("Phrase task did not complete: {err}"),
			})?;

			tracing::debug!(
				phrase = row.phrase.as_str(),
				combined_score = ?row.combined_score,
				error = ?row.error,
				"Phrase evaluated."
			);

			self.publish(ExecutionEvent::PhraseCompleted {
				search_configuration_id,
				phrase: row.phrase.clone(),
				combined_score: row.combined_score,
				error: row.error.clone(),
			});

			slots[index] = Some(row);
		}

		let mut rows: Vec<SearchPhraseExecution> = slots.into_iter().flatten().collect();

		// Stable, so equal phrases keep their input order.
		rows.sort_by(|a, b| a.phrase.cmp(&b.phrase));

		for (position, row) in rows.iter_mut().enumerate() {
			row.position = position as i32;
		}

		Ok(rows)
	}
}

async fn evaluate_phrase(
	plan: &PhrasePlan,
	phrase: CombinedJudgementPhrase,
) -> SearchPhraseExecution {
	let query = match plan
		.expander
		.expand(plan.backend, &plan.template, &plan.knobs, &plan.rulesets, &phrase.phrase)
		.await
	{
		Ok(query) => query,
		Err(err) => return failed_phrase(phrase.phrase, err.to_string()),
	};

	match plan.interface.execute_query(&query).await {
		Ok(response) => scored_phrase(plan, phrase, response),
		Err(err) => {
			tracing::warn!(phrase = phrase.phrase.as_str(), error = %err, "Backend query failed.");

			failed_phrase(phrase.phrase, err.to_string())
		},
	}
}

fn scored_phrase(
	plan: &PhrasePlan,
	phrase: CombinedJudgementPhrase,
	response: QueryResponse,
) -> SearchPhraseExecution {
	let ids: Vec<&str> = response.results.iter().map(|hit| hit.id.as_str()).collect();
	let scores: BTreeMap<String, f64> = plan
		.metrics
		.iter()
		.map(|metric| {
			(metric.to_string(), metric.score(&ids, &phrase.judgements, plan.relevance_threshold))
		})
		.collect();
	let combined_score = scores.get(&plan.combined_metric.to_string()).copied().unwrap_or_else(
		|| plan.combined_metric.score(&ids, &phrase.judgements, plan.relevance_threshold),
	);

	if let Some(degraded) = &response.error {
		tracing::warn!(
			phrase = phrase.phrase.as_str(),
			error = degraded.as_str(),
			"Backend response degraded."
		);
	}

	SearchPhraseExecution {
		position: 0,
		phrase: phrase.phrase,
		results: response.results,
		total_results: response.total_results,
		took_ms: response.took_ms,
		error: response.error,
		combined_score: Some(combined_score),
		scores,
	}
}

fn failed_phrase(phrase: String, error: String) -> SearchPhraseExecution {
	SearchPhraseExecution {
		position: 0,
		phrase,
		results: Vec::new(),
		total_results: None,
		took_ms: None,
		error: Some(error),
		combined_score: None,
		scores: BTreeMap::new(),
	}
}

/// Folds phrase rows into an execution. Only scored phrases contribute to the means; every phrase
/// with a timing contributes to the latency percentiles.
fn aggregate(
	configuration: &SearchConfiguration,
	metrics: &[Metric],
	phrases: Vec<SearchPhraseExecution>,
) -> NewExecution {
	let scored: Vec<&SearchPhraseExecution> =
		phrases.iter().filter(|phrase| phrase.is_scored()).collect();
	let combined_score =
		stats::mean(scored.iter().filter_map(|phrase| phrase.combined_score)).unwrap_or(0.0);
	let all_scores = metrics
		.iter()
		.map(|metric| {
			let label = metric.to_string();
			let value =
				stats::mean(scored.iter().filter_map(|phrase| phrase.scores.get(&label).copied()))
					.unwrap_or(0.0);

			(label, value)
		})
		.collect();
	let timings: Vec<u64> = phrases.iter().filter_map(|phrase| phrase.took_ms).collect();
	let scored_phrase_count = scored.len() as u32;
	let errored_phrase_count = phrases.len() as u32 - scored_phrase_count;

	NewExecution {
		search_configuration_id: configuration.search_configuration_id,
		combined_score,
		all_scores,
		latency: stats::latency_percentiles(&timings),
		scored_phrase_count,
		errored_phrase_count,
		phrases,
	}
}
