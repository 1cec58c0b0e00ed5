use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub expansion: Expansion,
	pub backends: Backends,
	#[serde(default)]
	pub evaluation: Evaluation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// Remote query expansion service used by the Elasticsearch family of backends.
#[derive(Debug, Clone, Deserialize)]
pub struct Expansion {
	pub api_base: String,
	pub path: String,
	/// Optional. Sent as a bearer token when present.
	#[serde(default)]
	pub api_key: Option<String>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backends {
	pub timeout_ms: u64,
	/// Number of ranked results requested from, and kept for, each phrase.
	#[serde(default = "default_result_depth")]
	pub result_depth: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Evaluation {
	#[serde(default = "default_concurrency")]
	pub concurrency: u32,
	#[serde(default = "default_relevance_threshold")]
	pub relevance_threshold: f64,
	#[serde(default = "default_metrics")]
	pub metrics: Vec<String>,
	#[serde(default = "default_combined_metric")]
	pub combined_metric: String,
}
impl Default for Evaluation {
	fn default() -> Self {
		Self {
			concurrency: default_concurrency(),
			relevance_threshold: default_relevance_threshold(),
			metrics: default_metrics(),
			combined_metric: default_combined_metric(),
		}
	}
}

fn default_result_depth() -> u32 {
	10
}

fn default_concurrency() -> u32 {
	4
}

fn default_relevance_threshold() -> f64 {
	2.0
}

fn default_metrics() -> Vec<String> {
	["ap@5", "ap@10", "p@5", "r@5", "ndcg@5"].into_iter().map(String::from).collect()
}

fn default_combined_metric() -> String {
	"ap@5".to_string()
}
