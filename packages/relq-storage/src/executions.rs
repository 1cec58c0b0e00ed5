//! Executions and their per-phrase rows. Both are written once and only read afterwards.

use sqlx::{PgConnection, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use relq_domain::execution::{Execution, NewExecution, SearchPhraseExecution};

use crate::{
	Result,
	db::Db,
	models::{ExecutionRow, PhraseExecutionRow},
};

const EXECUTION_COLUMNS: &str = "\
\texecution_id,
\tsearch_configuration_id,
\tcombined_score,
\tall_scores,
\tlatency_p50_ms,
\tlatency_p95_ms,
\tlatency_p99_ms,
\tphrase_count,
\tscored_phrase_count,
\terrored_phrase_count,
\tcreated_at";

/// Persists an execution and every phrase row in one transaction. The database assigns
/// `created_at`, so the returned value matches what later reads see.
pub async fn insert_execution(db: &Db, new: NewExecution) -> Result<Execution> {
	let execution_id = Uuid::new_v4();
	let all_scores = serde_json::to_value(&new.all_scores)?;
	let mut tx = db.pool.begin().await?;
	let created_at: OffsetDateTime = sqlx::query_scalar(
		"\
INSERT INTO executions (
\texecution_id,
\tsearch_configuration_id,
\tcombined_score,
\tall_scores,
\tlatency_p50_ms,
\tlatency_p95_ms,
\tlatency_p99_ms,
\tphrase_count,
\tscored_phrase_count,
\terrored_phrase_count
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
RETURNING created_at",
	)
	.bind(execution_id)
	.bind(new.search_configuration_id)
	.bind(new.combined_score)
	.bind(&all_scores)
	.bind(new.latency.map(|latency| latency.p50_ms as i64))
	.bind(new.latency.map(|latency| latency.p95_ms as i64))
	.bind(new.latency.map(|latency| latency.p99_ms as i64))
	.bind(new.phrases.len() as i32)
	.bind(new.scored_phrase_count as i32)
	.bind(new.errored_phrase_count as i32)
	.fetch_one(&mut *tx)
	.await?;

	for phrase in &new.phrases {
		insert_phrase_execution(&mut *tx, execution_id, phrase).await?;
	}

	tx.commit().await?;

	tracing::debug!(%execution_id, phrases = new.phrases.len(), "Execution persisted.");

	Ok(Execution::from_new(execution_id, created_at, new))
}

pub async fn get_execution(
	conn: &mut PgConnection,
	execution_id: Uuid,
) -> Result<Option<Execution>> {
	let sql = format!("SELECT\n{EXECUTION_COLUMNS}\nFROM executions\nWHERE execution_id = $1");
	let row = sqlx::query_as::<_, ExecutionRow>(&sql)
		.bind(execution_id)
		.fetch_optional(&mut *conn)
		.await?;

	match row {
		Some(row) => Ok(Some(hydrate(conn, row).await?)),
		None => Ok(None),
	}
}

/// Newest execution of a configuration by creation time.
pub async fn get_current_execution(
	conn: &mut PgConnection,
	search_configuration_id: Uuid,
) -> Result<Option<Execution>> {
	let sql = format!(
		"SELECT\n{EXECUTION_COLUMNS}\nFROM executions\nWHERE search_configuration_id = $1\n\
		 ORDER BY created_at DESC, execution_id DESC\nLIMIT 1"
	);
	let row = sqlx::query_as::<_, ExecutionRow>(&sql)
		.bind(search_configuration_id)
		.fetch_optional(&mut *conn)
		.await?;

	match row {
		Some(row) => Ok(Some(hydrate(conn, row).await?)),
		None => Ok(None),
	}
}

async fn insert_phrase_execution(
	conn: &mut PgConnection,
	execution_id: Uuid,
	phrase: &SearchPhraseExecution,
) -> Result<()> {
	let results = serde_json::to_value(&phrase.results)?;
	let scores = serde_json::to_value(&phrase.scores)?;

	sqlx::query(
		"\
INSERT INTO search_phrase_executions (
\texecution_id,
\tposition,
\tphrase,
\tresults,
\ttotal_results,
\ttook_ms,
\terror,
\tcombined_score,
\tscores
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
	)
	.bind(execution_id)
	.bind(phrase.position)
	.bind(phrase.phrase.as_str())
	.bind(&results)
	.bind(phrase.total_results.map(|total| total as i64))
	.bind(phrase.took_ms.map(|took| took as i64))
	.bind(phrase.error.as_deref())
	.bind(phrase.combined_score)
	.bind(&scores)
	.execute(conn)
	.await?;

	Ok(())
}

async fn phrase_executions<'e, E>(
	executor: E,
	execution_id: Uuid,
) -> Result<Vec<SearchPhraseExecution>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, PhraseExecutionRow>(
		"\
SELECT
\tposition,
\tphrase,
\tresults,
\ttotal_results,
\ttook_ms,
\terror,
\tcombined_score,
\tscores
FROM search_phrase_executions
WHERE execution_id = $1
ORDER BY position",
	)
	.bind(execution_id)
	.fetch_all(executor)
	.await?;

	rows.into_iter().map(PhraseExecutionRow::into_domain).collect()
}

async fn hydrate(conn: &mut PgConnection, row: ExecutionRow) -> Result<Execution> {
	let phrases = phrase_executions(&mut *conn, row.execution_id).await?;
	let latency = row.latency();

	Ok(Execution {
		execution_id: row.execution_id,
		search_configuration_id: row.search_configuration_id,
		combined_score: row.combined_score,
		all_scores: serde_json::from_value(row.all_scores)?,
		latency,
		phrase_count: row.phrase_count as u32,
		scored_phrase_count: row.scored_phrase_count as u32,
		errored_phrase_count: row.errored_phrase_count as u32,
		created_at: row.created_at,
		phrases,
	})
}
