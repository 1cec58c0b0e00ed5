//! Search configurations. Rows are immutable once written; a changed configuration is a new row.

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use relq_domain::{
	configuration::{SearchConfiguration, TemplateRef},
	judgement::JudgementSource,
	ruleset::RulesetRef,
};

use crate::{Error, Result, models::SearchConfigurationRow};

/// Writes a configuration with its ruleset and judgement references. Run it inside a
/// transaction so a configuration never appears half-written.
pub async fn insert_search_configuration(
	conn: &mut PgConnection,
	configuration: &SearchConfiguration,
) -> Result<()> {
	for source in &configuration.judgement_sources {
		if !source.weight.is_finite() || source.weight <= 0.0 {
			return Err(Error::InvalidArgument(format!(
				"Judgement source {} must have a finite weight greater than zero.",
				source.judgement_set_id
			)));
		}
	}

	let knobs = serde_json::to_value(&configuration.knobs)?;

	sqlx::query(
		"\
INSERT INTO search_configurations (
\tsearch_configuration_id,
\ttemplate_id,
\ttemplate_revision,
\tknobs,
\tcreated_at
)
VALUES ($1,$2,$3,$4,$5)",
	)
	.bind(configuration.search_configuration_id)
	.bind(configuration.template.template_id)
	.bind(configuration.template.revision)
	.bind(&knobs)
	.bind(configuration.created_at)
	.execute(&mut *conn)
	.await?;

	for (position, ruleset) in configuration.rulesets.iter().enumerate() {
		sqlx::query(
			"\
INSERT INTO search_configuration_rulesets (
\tsearch_configuration_id,
\tposition,
\truleset_id,
\truleset_version
)
VALUES ($1,$2,$3,$4)",
		)
		.bind(configuration.search_configuration_id)
		.bind(position as i32)
		.bind(ruleset.ruleset_id)
		.bind(ruleset.version)
		.execute(&mut *conn)
		.await?;
	}
	for source in &configuration.judgement_sources {
		sqlx::query(
			"\
INSERT INTO search_configuration_judgements (search_configuration_id, judgement_set_id, weight)
VALUES ($1,$2,$3)",
		)
		.bind(configuration.search_configuration_id)
		.bind(source.judgement_set_id)
		.bind(source.weight)
		.execute(&mut *conn)
		.await?;
	}

	Ok(())
}

pub async fn get_search_configuration(
	conn: &mut PgConnection,
	search_configuration_id: Uuid,
) -> Result<Option<SearchConfiguration>> {
	let row = sqlx::query_as::<_, SearchConfigurationRow>(
		"\
SELECT
\tsearch_configuration_id,
\ttemplate_id,
\ttemplate_revision,
\tknobs,
\tcreated_at
FROM search_configurations
WHERE search_configuration_id = $1",
	)
	.bind(search_configuration_id)
	.fetch_optional(&mut *conn)
	.await?;
	let Some(row) = row else {
		return Ok(None);
	};
	let rulesets = configuration_rulesets(&mut *conn, search_configuration_id).await?;
	let judgement_sources = configuration_judgements(&mut *conn, search_configuration_id).await?;

	Ok(Some(SearchConfiguration {
		search_configuration_id: row.search_configuration_id,
		template: TemplateRef { template_id: row.template_id, revision: row.template_revision },
		knobs: serde_json::from_value(row.knobs)?,
		rulesets,
		judgement_sources,
		created_at: row.created_at,
	}))
}

async fn configuration_rulesets<'e, E>(
	executor: E,
	search_configuration_id: Uuid,
) -> Result<Vec<RulesetRef>>
where
	E: PgExecutor<'e>,
{
	let rows: Vec<(Uuid, i32)> = sqlx::query_as(
		"\
SELECT ruleset_id, ruleset_version
FROM search_configuration_rulesets
WHERE search_configuration_id = $1
ORDER BY position",
	)
	.bind(search_configuration_id)
	.fetch_all(executor)
	.await?;

	Ok(rows.into_iter().map(|(ruleset_id, version)| RulesetRef { ruleset_id, version }).collect())
}

async fn configuration_judgements<'e, E>(
	executor: E,
	search_configuration_id: Uuid,
) -> Result<Vec<JudgementSource>>
where
	E: PgExecutor<'e>,
{
	let rows: Vec<(Uuid, f64)> = sqlx::query_as(
		"\
SELECT judgement_set_id, weight
FROM search_configuration_judgements
WHERE search_configuration_id = $1
ORDER BY judgement_set_id",
	)
	.bind(search_configuration_id)
	.fetch_all(executor)
	.await?;

	Ok(rows
		.into_iter()
		.map(|(judgement_set_id, weight)| JudgementSource { judgement_set_id, weight })
		.collect())
}
