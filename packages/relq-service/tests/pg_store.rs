use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use relq_config::Postgres;
use relq_domain::{
	configuration::{QueryTemplate, SearchConfiguration, TemplateRef},
	endpoint::{Credentials, SearchEndpoint},
	execution::{LatencyPercentiles, NewExecution, SearchHit, SearchPhraseExecution},
	judgement::{JudgementSource, Vote},
};
use relq_service::{EvaluationStore, PgEvaluationStore};
use relq_storage::{catalog, configurations, db::Db, judgements};
use relq_testkit::TestDatabase;

#[tokio::test]
#[ignore = "Requires external Postgres. Set RELQ_PG_DSN to run."]
async fn persisted_execution_reads_back_identically() {
	let Some(base_dsn) = relq_testkit::env_dsn() else {
		eprintln!("Skipping persisted_execution_reads_back_identically; set RELQ_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let endpoint = SearchEndpoint {
		search_endpoint_id: Uuid::new_v4(),
		name: "catalog".to_string(),
		endpoint_type: "opensearch".to_string(),
		base_url: "http://localhost:9200".to_string(),
		index: "catalog".to_string(),
		credentials: Credentials::ApiKey { key: "secret".to_string() },
	};
	let template = QueryTemplate {
		template_id: Uuid::new_v4(),
		revision: 2,
		search_endpoint_id: endpoint.search_endpoint_id,
		body: r#"{"query":{"match_all":{}}}"#.to_string(),
		knobs: BTreeMap::new(),
		ltr_model: Some("ltr-v1".to_string()),
	};
	let set_id = Uuid::new_v4();
	let configuration = SearchConfiguration {
		search_configuration_id: Uuid::new_v4(),
		template: TemplateRef { template_id: template.template_id, revision: 2 },
		knobs: BTreeMap::new(),
		rulesets: Vec::new(),
		judgement_sources: vec![JudgementSource { judgement_set_id: set_id, weight: 1.5 }],
		created_at: OffsetDateTime::UNIX_EPOCH,
	};

	catalog::insert_search_endpoint(&db.pool, &endpoint).await.expect("Failed to insert endpoint.");
	catalog::insert_query_template(&db.pool, &template).await.expect("Failed to insert template.");
	judgements::insert_judgement_set(&db.pool, set_id, "raters")
		.await
		.expect("Failed to insert judgement set.");

	let mut conn = db.pool.acquire().await.expect("Failed to acquire connection.");

	judgements::upsert_vote(&mut conn, set_id, "notebook", &Vote {
		doc_id: "doc1".to_string(),
		score: 3.0,
	})
	.await
	.expect("Failed to upsert vote.");
	configurations::insert_search_configuration(&mut conn, &configuration)
		.await
		.expect("Failed to insert configuration.");
	drop(conn);

	let store = PgEvaluationStore::new(db);
	let loaded = store
		.search_configuration(configuration.search_configuration_id)
		.await
		.expect("Failed to load configuration.")
		.expect("Configuration should exist.");
	let loaded_template = store
		.query_template(&loaded)
		.await
		.expect("Failed to load template.")
		.expect("Template should exist.");
	let loaded_endpoint = store
		.search_endpoint(&loaded_template)
		.await
		.expect("Failed to load endpoint.")
		.expect("Endpoint should exist.");
	let sources = store.judgement_sources(&loaded).await.expect("Failed to load judgements.");

	assert_eq!(loaded_endpoint, endpoint);
	assert_eq!(sources.len(), 1);
	assert_eq!(sources[0].1, 1.5);
	assert_eq!(sources[0].0.phrases[0].votes[0].score, 3.0);

	let new = NewExecution {
		search_configuration_id: configuration.search_configuration_id,
		combined_score: 0.5,
		all_scores: BTreeMap::from([("ap@5".to_string(), 0.5), ("ndcg@5".to_string(), 0.75)]),
		latency: Some(LatencyPercentiles { p50_ms: 12, p95_ms: 12, p99_ms: 12 }),
		scored_phrase_count: 1,
		errored_phrase_count: 0,
		phrases: vec![SearchPhraseExecution {
			position: 0,
			phrase: "notebook".to_string(),
			results: vec![
				SearchHit { id: "doc1".to_string(), explanation: None },
				SearchHit { id: "doc3".to_string(), explanation: None },
			],
			total_results: Some(2),
			took_ms: Some(12),
			error: None,
			combined_score: Some(0.5),
			scores: BTreeMap::from([("ap@5".to_string(), 0.5), ("ndcg@5".to_string(), 0.75)]),
		}],
	};
	let persisted = store.persist_execution(new).await.expect("Failed to persist execution.");
	let reread = store
		.execution(persisted.execution_id)
		.await
		.expect("Failed to read execution.")
		.expect("Execution should exist.");

	assert_eq!(reread, persisted);

	let current = store
		.current_execution(configuration.search_configuration_id)
		.await
		.expect("Failed to read current execution.");

	assert_eq!(current, Some(persisted));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
