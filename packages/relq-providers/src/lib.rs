pub mod elasticsearch;
pub mod expansion;
pub mod solr;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use reqwest::{
	Client, RequestBuilder, Response,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use relq_domain::{
	endpoint::{BackendType, Credentials, SearchEndpoint},
	execution::SearchHit,
};

use crate::{elasticsearch::ElasticsearchInterface, expansion::ExpandedQuery, solr::SolrInterface};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const MAX_REASON_CHARS: usize = 300;

/// Normalized outcome of one search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
	pub took_ms: Option<u64>,
	pub total_results: Option<u64>,
	pub results: Vec<SearchHit>,
	/// Non-fatal degradation reported by the backend, such as failed shards or partial results.
	pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
	pub id: String,
	pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
	/// Backend field types to keep. Empty keeps every type.
	#[serde(default)]
	pub types: Vec<String>,
	#[serde(default)]
	pub aggregatable_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
	pub success: bool,
	pub message: String,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
	pub timeout_ms: u64,
	pub result_depth: u32,
	pub default_headers: Map<String, Value>,
}
impl From<&relq_config::Backends> for BackendSettings {
	fn from(cfg: &relq_config::Backends) -> Self {
		Self {
			timeout_ms: cfg.timeout_ms,
			result_depth: cfg.result_depth,
			default_headers: cfg.default_headers.clone(),
		}
	}
}

/// Capability surface shared by every search backend family.
pub trait QueryInterface
where
	Self: Send + Sync,
{
	fn execute_query<'a>(&'a self, query: &'a ExpandedQuery)
	-> BoxFuture<'a, Result<QueryResponse>>;

	fn documents_by_id<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, Result<Vec<Document>>>;

	fn fields<'a>(&'a self, filter: Option<&'a FieldFilter>)
	-> BoxFuture<'a, Result<Vec<String>>>;

	fn field_values<'a>(
		&'a self,
		field: &'a str,
		prefix: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<String>>>;

	/// Never fails; transport and backend errors are folded into the returned status.
	fn test_connection(&self) -> BoxFuture<'_, ConnectionStatus>;
}

pub fn interface_for(
	endpoint: &SearchEndpoint,
	backend: BackendType,
	settings: &BackendSettings,
) -> Result<Arc<dyn QueryInterface>> {
	match backend {
		BackendType::Elasticsearch | BackendType::OpenSearch =>
			Ok(Arc::new(ElasticsearchInterface::new(endpoint, settings)?)),
		BackendType::Solr => Ok(Arc::new(SolrInterface::new(endpoint, settings)?)),
	}
}

pub fn auth_headers(
	api_key: Option<&str>,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = default_header_map(default_headers)?;

	if let Some(api_key) = api_key {
		headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	}

	Ok(headers)
}

pub(crate) fn default_header_map(default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn backend_client(settings: &BackendSettings) -> Result<Client> {
	let client = Client::builder()
		.timeout(Duration::from_millis(settings.timeout_ms))
		.default_headers(default_header_map(&settings.default_headers)?)
		.build()?;

	Ok(client)
}

pub(crate) fn authorize(request: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
	match credentials {
		Credentials::None => request,
		Credentials::Basic { username, password } => request.basic_auth(username, Some(password)),
		Credentials::ApiKey { key } => request.header(AUTHORIZATION, format!("ApiKey {key}")),
	}
}

pub(crate) fn endpoint_url(base_url: &str, index: &str, path: &str) -> String {
	let base = base_url.trim_end_matches('/');

	if path.is_empty() { format!("{base}/{index}") } else { format!("{base}/{index}/{path}") }
}

/// Reads a JSON body, turning non-2xx statuses into [`Error::Backend`].
pub(crate) async fn read_json(res: Response) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Backend {
			status: status.as_u16(),
			message: backend_reason(&body).unwrap_or_else(|| {
				status.canonical_reason().unwrap_or("Request failed.").to_string()
			}),
		});
	}

	Ok(res.json().await?)
}

pub(crate) fn hit_id(value: &Value) -> Option<String> {
	match value {
		Value::String(id) => Some(id.clone()),
		Value::Number(id) => Some(id.to_string()),
		_ => None,
	}
}

fn backend_reason(body: &str) -> Option<String> {
	let body = body.trim();

	if body.is_empty() {
		return None;
	}

	let Ok(json) = serde_json::from_str::<Value>(body) else {
		return Some(body.chars().take(MAX_REASON_CHARS).collect());
	};
	let error = json.get("error");
	let reason = error
		.and_then(|err| err.get("root_cause"))
		.and_then(|causes| causes.get(0))
		.and_then(|cause| cause.get("reason"))
		.or_else(|| error.and_then(|err| err.get("reason")))
		.or_else(|| error.and_then(|err| err.get("msg")))
		.or(error)
		.and_then(Value::as_str);

	Some(reason.unwrap_or(body).chars().take(MAX_REASON_CHARS).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_elasticsearch_root_cause() {
		let body = r#"{"error":{"root_cause":[{"reason":"no such index [books]"}],"reason":"x"}}"#;

		assert_eq!(backend_reason(body).as_deref(), Some("no such index [books]"));
	}

	#[test]
	fn extracts_solr_error_message() {
		let body = r#"{"responseHeader":{"status":400},"error":{"msg":"undefined field titel"}}"#;

		assert_eq!(backend_reason(body).as_deref(), Some("undefined field titel"));
	}

	#[test]
	fn falls_back_to_plain_body() {
		assert_eq!(backend_reason("  bad gateway \n").as_deref(), Some("bad gateway"));
		assert_eq!(backend_reason("   "), None);
	}

	#[test]
	fn builds_endpoint_urls_without_double_slashes() {
		assert_eq!(
			endpoint_url("http://es:9200/", "books", "_search"),
			"http://es:9200/books/_search"
		);
		assert_eq!(endpoint_url("http://es:9200", "books", ""), "http://es:9200/books");
	}
}
