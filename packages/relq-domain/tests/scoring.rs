use proptest::prelude::*;

use relq_domain::{
	judgement::Judgement,
	scoring::{self, Metric},
};

fn judged(pairs: &[(&str, f64)]) -> Vec<Judgement> {
	pairs
		.iter()
		.map(|(doc_id, score)| Judgement { doc_id: doc_id.to_string(), score: *score })
		.collect()
}

fn doc_ids_strategy() -> impl Strategy<Value = Vec<String>> {
	prop::collection::vec("doc[0-9]{1,2}", 0..20)
}

fn judgements_strategy() -> impl Strategy<Value = Vec<Judgement>> {
	prop::collection::btree_map("doc[0-9]{1,2}", 0.0_f64..=3.0, 0..20).prop_map(|docs| {
		docs.into_iter().map(|(doc_id, score)| Judgement { doc_id, score }).collect()
	})
}

#[test]
fn notebook_scenario_scores_half() {
	let judgements = judged(&[("doc1", 3.0), ("doc2", 0.0)]);
	let results = ["doc1", "doc3"];

	assert_eq!(scoring::ap_at_5(&results, &judgements), 0.5);
}

#[test]
fn ap_at_10_reaches_past_the_fifth_result() {
	let judgements = judged(&[("a", 3.0)]);
	let results = ["x1", "x2", "x3", "x4", "x5", "a"];

	assert_eq!(scoring::ap_at_5(&results, &judgements), 0.0);
	assert_eq!(scoring::ap_at_10(&results, &judgements), 1.0);
}

#[test]
fn average_precision_ignores_order_inside_window() {
	let judgements = judged(&[("a", 3.0), ("b", 2.0), ("c", 1.0)]);

	assert_eq!(
		scoring::average_precision(&["a", "b", "x"], &judgements),
		scoring::average_precision(&["x", "b", "a"], &judgements),
	);
	assert!((scoring::average_precision(&["a", "b", "x"], &judgements) - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn average_precision_uses_relevance_threshold() {
	let judgements = judged(&[("a", 1.9), ("b", 2.0)]);

	assert_eq!(scoring::average_precision(&["a", "b"], &judgements), 0.5);
	assert_eq!(scoring::average_precision_with_threshold(&["a", "b"], &judgements, 1.0), 1.0);
}

#[test]
fn empty_inputs_degrade_to_zero() {
	let judgements = judged(&[("a", 3.0)]);
	let no_results: [&str; 0] = [];

	assert_eq!(scoring::average_precision(&no_results, &judgements), 0.0);
	assert_eq!(scoring::average_precision(&["a"], &[]), 0.0);
	assert_eq!(scoring::average_precision(&no_results, &[]), 0.0);
	assert_eq!(scoring::precision(&no_results, &judgements), 0.0);
}

#[test]
fn recall_with_nothing_relevant_rewards_empty_results() {
	let judgements = judged(&[("a", 0.0), ("b", 1.0)]);
	let no_results: [&str; 0] = [];

	assert_eq!(scoring::recall(&no_results, &judgements), 1.0);
	assert_eq!(scoring::recall(&["a"], &judgements), 0.0);
	assert_eq!(scoring::recall(&no_results, &[]), 1.0);
}

#[test]
fn recall_counts_returned_relevant_documents() {
	let judgements = judged(&[("a", 3.0), ("b", 2.0), ("c", 3.0), ("d", 0.0)]);

	assert!((scoring::recall(&["a", "d", "x"], &judgements) - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn precision_divides_by_result_count() {
	let judgements = judged(&[("a", 3.0), ("b", 0.0)]);

	assert_eq!(scoring::precision(&["a", "b", "c", "d"], &judgements), 0.25);
}

#[test]
fn ndcg_rewards_better_ordering() {
	let judgements = judged(&[("a", 3.0), ("b", 1.0)]);
	let ideal = scoring::ndcg(&["a", "b"], &judgements);
	let swapped = scoring::ndcg(&["b", "a"], &judgements);

	assert!((ideal - 1.0).abs() < 1e-12, "Unexpected ideal ndcg: {ideal}");
	assert!(swapped < ideal);
	assert_eq!(scoring::ndcg(&["x"], &judged(&[("a", 0.0)])), 0.0);
}

#[test]
fn metric_labels_round_trip() {
	for label in ["ap@5", "ap@10", "p@5", "r@3", "ndcg@10"] {
		let metric: Metric = label.parse().expect("Expected a known metric label.");

		assert_eq!(metric.to_string(), label);
	}

	assert_eq!("AP@5".parse::<Metric>(), Ok(Metric::AveragePrecision { k: 5 }));
	assert!("ap@0".parse::<Metric>().is_err());
	assert!("mrr@5".parse::<Metric>().is_err());
	assert!("ap".parse::<Metric>().is_err());
}

#[test]
fn metric_truncates_to_its_cutoff() {
	let judgements = judged(&[("f", 3.0)]);
	let results = ["a", "b", "c", "d", "e", "f"];

	assert_eq!(Metric::AveragePrecision { k: 5 }.score(&results, &judgements, 2.0), 0.0);
	assert_eq!(Metric::AveragePrecision { k: 10 }.score(&results, &judgements, 2.0), 1.0);
	assert_eq!(Metric::Recall { k: 6 }.score(&results, &judgements, 2.0), 1.0);
}

proptest! {
	#[test]
	fn average_precision_is_bounded(
		results in doc_ids_strategy(),
		judgements in judgements_strategy(),
	) {
		let score = scoring::average_precision(&results, &judgements);

		prop_assert!((0.0..=1.0).contains(&score), "score out of range: {score}");
	}

	#[test]
	fn every_metric_is_bounded(results in doc_ids_strategy(), judgements in judgements_strategy()) {
		for metric in [
			Metric::AveragePrecision { k: 5 },
			Metric::Precision { k: 5 },
			Metric::Recall { k: 10 },
			Metric::Ndcg { k: 10 },
		] {
			let score = metric.score(&results, &judgements, 2.0);

			prop_assert!((0.0..=1.0).contains(&score), "{metric} out of range: {score}");
		}
	}

	#[test]
	fn ap_at_5_matches_truncated_average_precision(
		results in doc_ids_strategy(),
		judgements in judgements_strategy(),
	) {
		let window = &results[..results.len().min(5)];

		prop_assert_eq!(
			scoring::ap_at_5(&results, &judgements),
			scoring::average_precision(window, &judgements)
		);
	}

	#[test]
	fn ap_at_10_matches_truncated_average_precision(
		results in doc_ids_strategy(),
		judgements in judgements_strategy(),
	) {
		let window = &results[..results.len().min(10)];

		prop_assert_eq!(
			scoring::ap_at_10(&results, &judgements),
			scoring::average_precision(window, &judgements)
		);
	}

	#[test]
	fn empty_results_score_zero(judgements in judgements_strategy()) {
		let no_results: Vec<String> = Vec::new();

		prop_assert_eq!(scoring::average_precision(&no_results, &judgements), 0.0);
	}

	#[test]
	fn empty_judgements_score_zero(results in doc_ids_strategy()) {
		prop_assert_eq!(scoring::average_precision(&results, &[]), 0.0);
	}
}
