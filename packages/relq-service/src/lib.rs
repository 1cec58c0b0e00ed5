pub mod compare;
pub mod events;
pub mod execution;
pub mod inspect;
pub mod store;

mod error;

pub use compare::{ExecutionComparison, LatencyDelta, PhraseDelta, compare_executions};
pub use error::{Error, Result};
pub use events::ExecutionEvent;
pub use store::PgEvaluationStore;

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::sync::broadcast;
use uuid::Uuid;

use relq_config::Config;
use relq_domain::{
	configuration::{QueryTemplate, SearchConfiguration},
	endpoint::{BackendType, SearchEndpoint},
	execution::{Execution, NewExecution},
	judgement::{self, CombinedJudgementPhrase, JudgementSet},
	ruleset::Ruleset,
};
use relq_providers::{BackendSettings, QueryInterface, expansion::QueryExpander};
use relq_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const EVENT_CAPACITY: usize = 256;

/// Read and write access the orchestrator needs from persistence.
///
/// Lookups return `None` (or fewer rows) when a reference is dangling; the service decides
/// whether that is a missing resource or a broken configuration.
pub trait EvaluationStore
where
	Self: Send + Sync,
{
	fn search_configuration(
		&self,
		search_configuration_id: Uuid,
	) -> BoxFuture<'_, Result<Option<SearchConfiguration>>>;

	fn query_template<'a>(
		&'a self,
		configuration: &'a SearchConfiguration,
	) -> BoxFuture<'a, Result<Option<QueryTemplate>>>;

	fn search_endpoint<'a>(
		&'a self,
		template: &'a QueryTemplate,
	) -> BoxFuture<'a, Result<Option<SearchEndpoint>>>;

	fn search_endpoint_by_id(
		&self,
		search_endpoint_id: Uuid,
	) -> BoxFuture<'_, Result<Option<SearchEndpoint>>>;

	/// Referenced ruleset versions in configuration order. Missing versions are omitted.
	fn rulesets<'a>(
		&'a self,
		configuration: &'a SearchConfiguration,
	) -> BoxFuture<'a, Result<Vec<Ruleset>>>;

	/// Referenced judgement sets with their weights. Missing sets are omitted.
	fn judgement_sources<'a>(
		&'a self,
		configuration: &'a SearchConfiguration,
	) -> BoxFuture<'a, Result<Vec<(JudgementSet, f64)>>>;

	/// Writes the execution and all of its phrase rows atomically.
	fn persist_execution(&self, execution: NewExecution) -> BoxFuture<'_, Result<Execution>>;

	fn execution(&self, execution_id: Uuid) -> BoxFuture<'_, Result<Option<Execution>>>;

	fn current_execution(
		&self,
		search_configuration_id: Uuid,
	) -> BoxFuture<'_, Result<Option<Execution>>>;
}

/// Builds the query interface for an endpoint once its backend family is known.
pub trait BackendFactory
where
	Self: Send + Sync,
{
	fn interface(
		&self,
		endpoint: &SearchEndpoint,
		backend: BackendType,
	) -> relq_providers::Result<Arc<dyn QueryInterface>>;
}

pub struct HttpBackends {
	settings: BackendSettings,
}
impl HttpBackends {
	pub fn new(settings: BackendSettings) -> Self {
		Self { settings }
	}
}
impl BackendFactory for HttpBackends {
	fn interface(
		&self,
		endpoint: &SearchEndpoint,
		backend: BackendType,
	) -> relq_providers::Result<Arc<dyn QueryInterface>> {
		relq_providers::interface_for(endpoint, backend, &self.settings)
	}
}

pub struct RelqService {
	pub cfg: Config,
	pub store: Arc<dyn EvaluationStore>,
	pub backends: Arc<dyn BackendFactory>,
	pub expander: QueryExpander,
	events: broadcast::Sender<ExecutionEvent>,
}
impl RelqService {
	pub fn new(cfg: Config, db: Db) -> Result<Self> {
		let store = Arc::new(PgEvaluationStore::new(db));
		let backends = Arc::new(HttpBackends::new(BackendSettings::from(&cfg.backends)));
		let expander = QueryExpander::from_config(&cfg.expansion)?;

		Ok(Self::with_parts(cfg, store, backends, expander))
	}

	pub fn with_parts(
		cfg: Config,
		store: Arc<dyn EvaluationStore>,
		backends: Arc<dyn BackendFactory>,
		expander: QueryExpander,
	) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);

		Self { cfg, store, backends, expander, events }
	}

	/// Receives progress events for every run started after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
		self.events.subscribe()
	}

	/// Weighted consensus judgements for a configuration.
	pub async fn combined_judgements(
		&self,
		configuration: &SearchConfiguration,
	) -> Result<Vec<CombinedJudgementPhrase>> {
		let sources = self.store.judgement_sources(configuration).await?;

		if let Some(missing) = configuration.judgement_sources.iter().find(|source| {
			!sources.iter().any(|(set, _)| set.judgement_set_id == source.judgement_set_id)
		}) {
			return Err(Error::ConfigurationIntegrity {
				message: format!(
					"Search configuration {} references missing judgement set {}.",
					configuration.search_configuration_id, missing.judgement_set_id
				),
			});
		}

		Ok(judgement::combine(&sources)?)
	}

	pub async fn execution(&self, execution_id: Uuid) -> Result<Execution> {
		self.store.execution(execution_id).await?.ok_or_else(|| Error::NotFound {
			message: format!("Execution {execution_id} does not exist."),
		})
	}

	/// Latest execution of a configuration, if it has ever been run.
	pub async fn current_execution(
		&self,
		search_configuration_id: Uuid,
	) -> Result<Option<Execution>> {
		self.store.current_execution(search_configuration_id).await
	}

	pub(crate) fn publish(&self, event: ExecutionEvent) {
		// Sending only fails when nobody is subscribed.
		let _ = self.events.send(event);
	}
}
