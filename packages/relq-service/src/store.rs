//! Postgres-backed [`EvaluationStore`].

use uuid::Uuid;

use relq_domain::{
	configuration::{QueryTemplate, SearchConfiguration},
	endpoint::SearchEndpoint,
	execution::{Execution, NewExecution},
	judgement::JudgementSet,
	ruleset::Ruleset,
};
use relq_storage::{catalog, configurations, db::Db, executions, judgements};

use crate::{BoxFuture, EvaluationStore, Result};

pub struct PgEvaluationStore {
	db: Db,
}
impl PgEvaluationStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	async fn load_configuration(
		&self,
		search_configuration_id: Uuid,
	) -> Result<Option<SearchConfiguration>> {
		let mut conn = self.db.pool.acquire().await.map_err(relq_storage::Error::from)?;

		Ok(configurations::get_search_configuration(&mut conn, search_configuration_id).await?)
	}

	async fn load_template(
		&self,
		configuration: &SearchConfiguration,
	) -> Result<Option<QueryTemplate>> {
		let template = configuration.template;

		Ok(catalog::get_query_template(&self.db.pool, template.template_id, template.revision)
			.await?)
	}

	async fn load_endpoint(&self, search_endpoint_id: Uuid) -> Result<Option<SearchEndpoint>> {
		Ok(catalog::get_search_endpoint(&self.db.pool, search_endpoint_id).await?)
	}

	async fn load_rulesets(&self, configuration: &SearchConfiguration) -> Result<Vec<Ruleset>> {
		Ok(catalog::get_rulesets(&self.db.pool, &configuration.rulesets).await?)
	}

	async fn load_judgement_sources(
		&self,
		configuration: &SearchConfiguration,
	) -> Result<Vec<(JudgementSet, f64)>> {
		let mut sources = Vec::with_capacity(configuration.judgement_sources.len());

		for source in &configuration.judgement_sources {
			if let Some(set) =
				judgements::get_judgement_set(&self.db.pool, source.judgement_set_id).await?
			{
				sources.push((set, source.weight));
			}
		}

		Ok(sources)
	}

	async fn store_execution(&self, execution: NewExecution) -> Result<Execution> {
		Ok(executions::insert_execution(&self.db, execution).await?)
	}

	async fn load_execution(&self, execution_id: Uuid) -> Result<Option<Execution>> {
		let mut conn = self.db.pool.acquire().await.map_err(relq_storage::Error::from)?;

		Ok(executions::get_execution(&mut conn, execution_id).await?)
	}

	async fn load_current_execution(
		&self,
		search_configuration_id: Uuid,
	) -> Result<Option<Execution>> {
		let mut conn = self.db.pool.acquire().await.map_err(relq_storage::Error::from)?;

		Ok(executions::get_current_execution(&mut conn, search_configuration_id).await?)
	}
}
impl EvaluationStore for PgEvaluationStore {
	fn search_configuration(
		&self,
		search_configuration_id: Uuid,
	) -> BoxFuture<'_, Result<Option<SearchConfiguration>>> {
		Box::pin(self.load_configuration(search_configuration_id))
	}

	fn query_template<'a>(
		&'a self,
		configuration: &'a SearchConfiguration,
	) -> BoxFuture<'a, Result<Option<QueryTemplate>>> {
		Box::pin(self.load_template(configuration))
	}

	fn search_endpoint<'a>(
		&'a self,
		template: &'a QueryTemplate,
	) -> BoxFuture<'a, Result<Option<SearchEndpoint>>> {
		Box::pin(self.load_endpoint(template.search_endpoint_id))
	}

	fn search_endpoint_by_id(
		&self,
		search_endpoint_id: Uuid,
	) -> BoxFuture<'_, Result<Option<SearchEndpoint>>> {
		Box::pin(self.load_endpoint(search_endpoint_id))
	}

	fn rulesets<'a>(
		&'a self,
		configuration: &'a SearchConfiguration,
	) -> BoxFuture<'a, Result<Vec<Ruleset>>> {
		Box::pin(self.load_rulesets(configuration))
	}

	fn judgement_sources<'a>(
		&'a self,
		configuration: &'a SearchConfiguration,
	) -> BoxFuture<'a, Result<Vec<(JudgementSet, f64)>>> {
		Box::pin(self.load_judgement_sources(configuration))
	}

	fn persist_execution(&self, execution: NewExecution) -> BoxFuture<'_, Result<Execution>> {
		Box::pin(self.store_execution(execution))
	}

	fn execution(&self, execution_id: Uuid) -> BoxFuture<'_, Result<Option<Execution>>> {
		Box::pin(self.load_execution(execution_id))
	}

	fn current_execution(
		&self,
		search_configuration_id: Uuid,
	) -> BoxFuture<'_, Result<Option<Execution>>> {
		Box::pin(self.load_current_execution(search_configuration_id))
	}
}
