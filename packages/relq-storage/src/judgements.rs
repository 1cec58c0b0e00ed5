//! Judgement sets and their votes.
//!
//! A vote is unique per (phrase, document) within a set; writing it again replaces the score.

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use relq_domain::judgement::{JudgementPhrase, JudgementSet, Vote};

use crate::{Error, Result, models::JudgementVoteRow};

pub async fn insert_judgement_set<'e, E>(
	executor: E,
	judgement_set_id: Uuid,
	name: &str,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query("INSERT INTO judgement_sets (judgement_set_id, name) VALUES ($1,$2)")
		.bind(judgement_set_id)
		.bind(name)
		.execute(executor)
		.await?;

	Ok(())
}

/// Registers a phrase in a set without votes, so it is still evaluated.
pub async fn ensure_phrase(
	conn: &mut PgConnection,
	judgement_set_id: Uuid,
	phrase: &str,
) -> Result<Uuid> {
	let phrase_id: Uuid = sqlx::query_scalar(
		"\
INSERT INTO judgement_phrases (phrase_id, judgement_set_id, phrase)
VALUES ($1,$2,$3)
ON CONFLICT (judgement_set_id, phrase) DO UPDATE SET phrase = EXCLUDED.phrase
RETURNING phrase_id",
	)
	.bind(Uuid::new_v4())
	.bind(judgement_set_id)
	.bind(phrase)
	.fetch_one(&mut *conn)
	.await?;

	Ok(phrase_id)
}

pub async fn upsert_vote(
	conn: &mut PgConnection,
	judgement_set_id: Uuid,
	phrase: &str,
	vote: &Vote,
) -> Result<()> {
	if !vote.score.is_finite() {
		return Err(Error::InvalidArgument(format!(
			"Vote for document {:?} must have a finite score.",
			vote.doc_id
		)));
	}

	let phrase_id = ensure_phrase(conn, judgement_set_id, phrase).await?;

	sqlx::query(
		"\
INSERT INTO judgement_votes (phrase_id, doc_id, score)
VALUES ($1,$2,$3)
ON CONFLICT (phrase_id, doc_id) DO UPDATE
SET score = EXCLUDED.score, updated_at = now()",
	)
	.bind(phrase_id)
	.bind(vote.doc_id.as_str())
	.bind(vote.score)
	.execute(&mut *conn)
	.await?;

	Ok(())
}

pub async fn get_judgement_set<'e, E>(
	executor: E,
	judgement_set_id: Uuid,
) -> Result<Option<JudgementSet>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, JudgementVoteRow>(
		"\
SELECT s.name, p.phrase, v.doc_id, v.score
FROM judgement_sets s
LEFT JOIN judgement_phrases p ON p.judgement_set_id = s.judgement_set_id
LEFT JOIN judgement_votes v ON v.phrase_id = p.phrase_id
WHERE s.judgement_set_id = $1
ORDER BY p.phrase, v.doc_id",
	)
	.bind(judgement_set_id)
	.fetch_all(executor)
	.await?;
	let Some(name) = rows.first().map(|row| row.name.clone()) else {
		return Ok(None);
	};

	Ok(Some(JudgementSet { judgement_set_id, name, phrases: group_votes(rows) }))
}

/// Folds rows ordered by phrase into phrases with their votes.
fn group_votes(rows: Vec<JudgementVoteRow>) -> Vec<JudgementPhrase> {
	let mut phrases: Vec<JudgementPhrase> = Vec::new();

	for row in rows {
		// A set without phrases still yields one row from the outer join.
		let Some(phrase) = row.phrase else {
			continue;
		};

		if phrases.last().is_none_or(|last| last.phrase != phrase) {
			phrases.push(JudgementPhrase { phrase, votes: Vec::new() });
		}

		if let (Some(doc_id), Some(score), Some(current)) =
			(row.doc_id, row.score, phrases.last_mut())
		{
			current.votes.push(Vote { doc_id, score });
		}
	}

	phrases
}
