//! Information-retrieval metrics over a ranked id list and consensus judgements.
//!
//! Every function here is pure. Scores are always within `[0, 1]`.

use std::{
	collections::{HashMap, HashSet},
	fmt,
	str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, judgement::Judgement};

/// Judged score at or above which a document counts as relevant (0-3 scale).
pub const RELEVANCE_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
	AveragePrecision { k: usize },
	Precision { k: usize },
	Recall { k: usize },
	Ndcg { k: usize },
}
impl Metric {
	pub fn cutoff(&self) -> usize {
		match self {
			Self::AveragePrecision { k }
			| Self::Precision { k }
			| Self::Recall { k }
			| Self::Ndcg { k } => *k,
		}
	}

	pub fn score<S>(&self, result_ids: &[S], judgements: &[Judgement], threshold: f64) -> f64
	where
		S: AsRef<str>,
	{
		let window = truncate(result_ids, self.cutoff());

		match self {
			Self::AveragePrecision { .. } =>
				average_precision_with_threshold(window, judgements, threshold),
			Self::Precision { .. } => precision_with_threshold(window, judgements, threshold),
			Self::Recall { .. } => recall_with_threshold(window, judgements, threshold),
			Self::Ndcg { .. } => ndcg(window, judgements),
		}
	}
}
impl fmt::Display for Metric {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::AveragePrecision { k } => write!(f, "ap@{k}"),
			Self::Precision { k } => write!(f, "p@{k}"),
			Self::Recall { k } => write!(f, "r@{k}"),
			Self::Ndcg { k } => write!(f, "ndcg@{k}"),
		}
	}
}
impl FromStr for Metric {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let unknown = || Error::UnknownMetric { label: raw.to_string() };
		let normalized = raw.trim().to_lowercase();
		let (name, k) = normalized.split_once('@').ok_or_else(unknown)?;
		let k: usize = k.parse().map_err(|_| unknown())?;

		if k == 0 {
			return Err(unknown());
		}

		match name {
			"ap" => Ok(Self::AveragePrecision { k }),
			"p" => Ok(Self::Precision { k }),
			"r" => Ok(Self::Recall { k }),
			"ndcg" => Ok(Self::Ndcg { k }),
			_ => Err(unknown()),
		}
	}
}
impl Serialize for Metric {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(self)
	}
}
impl<'de> Deserialize<'de> for Metric {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Threshold variant of average precision used for execution scoring.
///
/// Counts judged-relevant documents present anywhere in `result_ids` and divides by
/// `max(min(|result_ids|, |judgements|), 1)`. Position inside the window does not matter.
pub fn average_precision<S>(result_ids: &[S], judgements: &[Judgement]) -> f64
where
	S: AsRef<str>,
{
	average_precision_with_threshold(result_ids, judgements, RELEVANCE_THRESHOLD)
}

pub fn average_precision_with_threshold<S>(
	result_ids: &[S],
	judgements: &[Judgement],
	threshold: f64,
) -> f64
where
	S: AsRef<str>,
{
	let judged = judged_scores(judgements);
	let found = relevant_found(result_ids, &judged, threshold);
	let denominator = result_ids.len().min(judged.len()).max(1);

	found as f64 / denominator as f64
}

pub fn ap_at<S>(k: usize, result_ids: &[S], judgements: &[Judgement]) -> f64
where
	S: AsRef<str>,
{
	average_precision(truncate(result_ids, k), judgements)
}

pub fn ap_at_5<S>(result_ids: &[S], judgements: &[Judgement]) -> f64
where
	S: AsRef<str>,
{
	ap_at(5, result_ids, judgements)
}

pub fn ap_at_10<S>(result_ids: &[S], judgements: &[Judgement]) -> f64
where
	S: AsRef<str>,
{
	ap_at(10, result_ids, judgements)
}

pub fn precision<S>(result_ids: &[S], judgements: &[Judgement]) -> f64
where
	S: AsRef<str>,
{
	precision_with_threshold(result_ids, judgements, RELEVANCE_THRESHOLD)
}

pub fn precision_with_threshold<S>(
	result_ids: &[S],
	judgements: &[Judgement],
	threshold: f64,
) -> f64
where
	S: AsRef<str>,
{
	if result_ids.is_empty() {
		return 0.0;
	}

	let judged = judged_scores(judgements);

	relevant_found(result_ids, &judged, threshold) as f64 / result_ids.len() as f64
}

pub fn recall<S>(result_ids: &[S], judgements: &[Judgement]) -> f64
where
	S: AsRef<str>,
{
	recall_with_threshold(result_ids, judgements, RELEVANCE_THRESHOLD)
}

/// Fraction of judged-relevant documents that were returned.
///
/// With nothing judged relevant, an empty result list is a perfect answer and anything else
/// scores zero.
pub fn recall_with_threshold<S>(
	result_ids: &[S],
	judgements: &[Judgement],
	threshold: f64,
) -> f64
where
	S: AsRef<str>,
{
	let judged = judged_scores(judgements);
	let relevant_total = judged.values().filter(|score| **score >= threshold).count();

	if relevant_total == 0 {
		return if result_ids.is_empty() { 1.0 } else { 0.0 };
	}

	relevant_found(result_ids, &judged, threshold) as f64 / relevant_total as f64
}

/// Normalized discounted cumulative gain with graded gain `2^score - 1`.
pub fn ndcg<S>(result_ids: &[S], judgements: &[Judgement]) -> f64
where
	S: AsRef<str>,
{
	let judged = judged_scores(judgements);
	let mut seen = HashSet::with_capacity(result_ids.len());
	let mut dcg = 0.0_f64;

	for (idx, id) in result_ids.iter().enumerate() {
		let id = id.as_ref();

		if !seen.insert(id) {
			continue;
		}
		if let Some(score) = judged.get(id) {
			dcg += gain(*score) / discount(idx);
		}
	}

	let mut ideal: Vec<f64> = judged.values().map(|score| gain(*score)).collect();

	ideal.sort_by(|a, b| b.total_cmp(a));

	let idcg: f64 = ideal
		.iter()
		.take(result_ids.len())
		.enumerate()
		.map(|(idx, gain)| gain / discount(idx))
		.sum();

	if idcg <= 0.0 {
		return 0.0;
	}

	(dcg / idcg).clamp(0.0, 1.0)
}

fn truncate<S>(result_ids: &[S], k: usize) -> &[S] {
	&result_ids[..result_ids.len().min(k)]
}

fn judged_scores(judgements: &[Judgement]) -> HashMap<&str, f64> {
	judgements.iter().map(|judgement| (judgement.doc_id.as_str(), judgement.score)).collect()
}

fn relevant_found<S>(result_ids: &[S], judged: &HashMap<&str, f64>, threshold: f64) -> usize
where
	S: AsRef<str>,
{
	let returned: HashSet<&str> = result_ids.iter().map(AsRef::as_ref).collect();

	judged
		.iter()
		.filter(|(doc_id, score)| **score >= threshold && returned.contains(*doc_id))
		.count()
}

fn gain(score: f64) -> f64 {
	if score.is_finite() && score > 0.0 { score.exp2() - 1.0 } else { 0.0 }
}

fn discount(idx: usize) -> f64 {
	(idx as f64 + 2.0).log2()
}
