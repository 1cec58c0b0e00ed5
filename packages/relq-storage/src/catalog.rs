//! Search endpoints, query template revisions, and ruleset versions.

use sqlx::PgExecutor;
use uuid::Uuid;

use relq_domain::{
	configuration::QueryTemplate,
	endpoint::SearchEndpoint,
	ruleset::{Ruleset, RulesetRef},
};

use crate::{
	Error, Result,
	models::{QueryTemplateRow, RulesetRow, SearchEndpointRow},
};

pub async fn insert_search_endpoint<'e, E>(executor: E, endpoint: &SearchEndpoint) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let credentials = serde_json::to_value(&endpoint.credentials)?;

	sqlx::query(
		"\
INSERT INTO search_endpoints (
\tsearch_endpoint_id,
\tname,
\tendpoint_type,
\tbase_url,
\tindex_name,
\tcredentials
)
VALUES ($1,$2,$3,$4,$5,$6)",
	)
	.bind(endpoint.search_endpoint_id)
	.bind(endpoint.name.as_str())
	.bind(endpoint.endpoint_type.as_str())
	.bind(endpoint.base_url.as_str())
	.bind(endpoint.index.as_str())
	.bind(&credentials)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_search_endpoint<'e, E>(
	executor: E,
	search_endpoint_id: Uuid,
) -> Result<Option<SearchEndpoint>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, SearchEndpointRow>(
		"\
SELECT
\tsearch_endpoint_id,
\tname,
\tendpoint_type,
\tbase_url,
\tindex_name,
\tcredentials
FROM search_endpoints
WHERE search_endpoint_id = $1",
	)
	.bind(search_endpoint_id)
	.fetch_optional(executor)
	.await?;

	row.map(SearchEndpointRow::into_domain).transpose()
}

/// Template revisions are append-only; re-inserting an existing revision is a conflict.
pub async fn insert_query_template<'e, E>(executor: E, template: &QueryTemplate) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let knobs = serde_json::to_value(&template.knobs)?;
	let inserted = sqlx::query(
		"\
INSERT INTO query_templates (
\ttemplate_id,
\trevision,
\tsearch_endpoint_id,
\tbody,
\tknobs,
\tltr_model
)
VALUES ($1,$2,$3,$4,$5,$6)
ON CONFLICT (template_id, revision) DO NOTHING",
	)
	.bind(template.template_id)
	.bind(template.revision)
	.bind(template.search_endpoint_id)
	.bind(template.body.as_str())
	.bind(&knobs)
	.bind(template.ltr_model.as_deref())
	.execute(executor)
	.await?
	.rows_affected();

	if inserted == 0 {
		return Err(Error::Conflict(format!(
			"Query template {} revision {} already exists.",
			template.template_id, template.revision
		)));
	}

	Ok(())
}

pub async fn get_query_template<'e, E>(
	executor: E,
	template_id: Uuid,
	revision: i32,
) -> Result<Option<QueryTemplate>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, QueryTemplateRow>(
		"\
SELECT
\ttemplate_id,
\trevision,
\tsearch_endpoint_id,
\tbody,
\tknobs,
\tltr_model
FROM query_templates
WHERE template_id = $1 AND revision = $2",
	)
	.bind(template_id)
	.bind(revision)
	.fetch_optional(executor)
	.await?;

	row.map(QueryTemplateRow::into_domain).transpose()
}

pub async fn insert_ruleset<'e, E>(executor: E, ruleset: &Ruleset) -> Result<()>
where
	E: PgExecutor<'e>,
{
	for rule in &ruleset.rules {
		rule.validate().map_err(|err| Error::InvalidArgument(err.to_string()))?;
	}

	let rules = serde_json::to_value(&ruleset.rules)?;
	let inserted = sqlx::query(
		"\
INSERT INTO rulesets (ruleset_id, version, name, rules)
VALUES ($1,$2,$3,$4)
ON CONFLICT (ruleset_id, version) DO NOTHING",
	)
	.bind(ruleset.ruleset_id)
	.bind(ruleset.version)
	.bind(ruleset.name.as_str())
	.bind(&rules)
	.execute(executor)
	.await?
	.rows_affected();

	if inserted == 0 {
		return Err(Error::Conflict(format!(
			"Ruleset {} version {} already exists.",
			ruleset.ruleset_id, ruleset.version
		)));
	}

	Ok(())
}

/// Loads the referenced ruleset versions in reference order. Missing versions are skipped.
pub async fn get_rulesets<'e, E>(executor: E, refs: &[RulesetRef]) -> Result<Vec<Ruleset>>
where
	E: PgExecutor<'e>,
{
	if refs.is_empty() {
		return Ok(Vec::new());
	}

	let ids: Vec<Uuid> = refs.iter().map(|r| r.ruleset_id).collect();
	let versions: Vec<i32> = refs.iter().map(|r| r.version).collect();
	let rows = sqlx::query_as::<_, RulesetRow>(
		"\
SELECT r.ruleset_id, r.version, r.name, r.rules
FROM unnest($1::uuid[], $2::int4[]) WITH ORDINALITY AS wanted (ruleset_id, version, ord)
JOIN rulesets r ON r.ruleset_id = wanted.ruleset_id AND r.version = wanted.version
ORDER BY wanted.ord",
	)
	.bind(&ids)
	.bind(&versions)
	.fetch_all(executor)
	.await?;

	rows.into_iter().map(RulesetRow::into_domain).collect()
}
