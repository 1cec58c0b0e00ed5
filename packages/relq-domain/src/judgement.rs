use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// A single rater's relevance score for one document under one phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
	pub doc_id: String,
	pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgementPhrase {
	pub phrase: String,
	pub votes: Vec<Vote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgementSet {
	pub judgement_set_id: Uuid,
	pub name: String,
	pub phrases: Vec<JudgementPhrase>,
}

/// A weighted pointer from a search configuration to one judgement set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgementSource {
	pub judgement_set_id: Uuid,
	pub weight: f64,
}

/// Consensus relevance score for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
	pub doc_id: String,
	pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedJudgementPhrase {
	pub phrase: String,
	pub judgements: Vec<Judgement>,
}

#[derive(Default)]
struct WeightedSum {
	weighted: f64,
	weight: f64,
}

/// Combines weighted judgement sets into one consensus score per (phrase, document).
///
/// Each document's score is the weighted mean over only the sources that voted on it. Output is
/// ordered by phrase, then by document id, so repeated runs score identically regardless of the
/// order the store returned rows in.
pub fn combine(sources: &[(JudgementSet, f64)]) -> Result<Vec<CombinedJudgementPhrase>> {
	for (set, weight) in sources {
		if !weight.is_finite() || *weight <= 0.0 {
			return Err(Error::InvalidWeight {
				judgement_set_id: set.judgement_set_id,
				weight: *weight,
			});
		}
	}

	let mut phrases: BTreeMap<&str, BTreeMap<&str, WeightedSum>> = BTreeMap::new();

	for (set, weight) in sources {
		for phrase in &set.phrases {
			let docs = phrases.entry(phrase.phrase.as_str()).or_default();
			// Last vote wins when a source repeats a document.
			let mut latest: HashMap<&str, f64> = HashMap::with_capacity(phrase.votes.len());

			for vote in &phrase.votes {
				latest.insert(vote.doc_id.as_str(), vote.score);
			}
			for (doc_id, score) in latest {
				let sum = docs.entry(doc_id).or_default();

				sum.weighted += weight * score;
				sum.weight += weight;
			}
		}
	}

	let combined = phrases
		.into_iter()
		.map(|(phrase, docs)| CombinedJudgementPhrase {
			phrase: phrase.to_string(),
			judgements: docs
				.into_iter()
				.map(|(doc_id, sum)| Judgement {
					doc_id: doc_id.to_string(),
					score: sum.weighted / sum.weight,
				})
				.collect(),
		})
		.collect();

	Ok(combined)
}
