use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value};

use relq_domain::{
	endpoint::{Credentials, SearchEndpoint},
	execution::SearchHit,
};

use crate::{
	BackendSettings, BoxFuture, ConnectionStatus, Document, Error, FieldFilter, QueryInterface,
	QueryResponse, Result,
	expansion::{EsQuery, ExpandedQuery},
};

const FIELD_VALUES_LIMIT: usize = 100;

/// Adapter for Elasticsearch and OpenSearch; both speak the same search API.
pub struct ElasticsearchInterface {
	client: Client,
	base_url: String,
	index: String,
	credentials: Credentials,
	result_depth: u32,
}
impl ElasticsearchInterface {
	pub fn new(endpoint: &SearchEndpoint, settings: &BackendSettings) -> Result<Self> {
		Ok(Self {
			client: crate::backend_client(settings)?,
			base_url: endpoint.base_url.clone(),
			index: endpoint.index.clone(),
			credentials: endpoint.credentials.clone(),
			result_depth: settings.result_depth,
		})
	}

	fn get(&self, path: &str) -> RequestBuilder {
		let url = crate::endpoint_url(&self.base_url, &self.index, path);

		crate::authorize(self.client.get(url), &self.credentials)
	}

	fn post(&self, path: &str) -> RequestBuilder {
		let url = crate::endpoint_url(&self.base_url, &self.index, path);

		crate::authorize(self.client.post(url), &self.credentials)
	}

	async fn search(&self, query: &EsQuery) -> Result<QueryResponse> {
		let body = search_body(query, self.result_depth);
		let res = self.post("_search").query(&[("explain", "true")]).json(&body).send().await?;
		let json = crate::read_json(res).await?;

		parse_search_response(&json)
	}

	async fn mget(&self, ids: &[String]) -> Result<Vec<Document>> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}

		let res = self.post("_mget").json(&serde_json::json!({ "ids": ids })).send().await?;
		let json = crate::read_json(res).await?;

		parse_mget_response(&json)
	}

	async fn field_caps(&self, filter: Option<&FieldFilter>) -> Result<Vec<String>> {
		let res = self.get("_field_caps").query(&[("fields", "*")]).send().await?;
		let json = crate::read_json(res).await?;

		parse_field_caps_response(&json, filter)
	}

	async fn terms(&self, field: &str, prefix: Option<&str>) -> Result<Vec<String>> {
		let mut terms = serde_json::json!({ "field": field, "size": FIELD_VALUES_LIMIT });

		if let Some(prefix) = prefix.filter(|prefix| !prefix.is_empty()) {
			terms["include"] = Value::String(format!("{}.*", escape_regex(prefix)));
		}

		let body = serde_json::json!({ "size": 0, "aggs": { "values": { "terms": terms } } });
		let res = self.post("_search").json(&body).send().await?;
		let json = crate::read_json(res).await?;

		parse_terms_response(&json)
	}

	async fn ping(&self) -> ConnectionStatus {
		let outcome = match self.get("").send().await {
			Ok(res) => crate::read_json(res).await.map(|_| ()),
			Err(err) => Err(Error::from(err)),
		};

		match outcome {
			Ok(()) => ConnectionStatus {
				success: true,
				message: format!("Connected to index {}.", self.index),
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					index = %self.index,
					"Search endpoint is unreachable."
				);

				ConnectionStatus { success: false, message: err.to_string() }
			},
		}
	}
}
impl QueryInterface for ElasticsearchInterface {
	fn execute_query<'a>(
		&'a self,
		query: &'a ExpandedQuery,
	) -> BoxFuture<'a, Result<QueryResponse>> {
		Box::pin(async move {
			match query {
				ExpandedQuery::Elasticsearch(query) => self.search(query).await,
				other => Err(Error::InvalidConfig {
					message: format!(
						"Elasticsearch endpoints cannot execute {} queries.",
						other.family()
					),
				}),
			}
		})
	}

	fn documents_by_id<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, Result<Vec<Document>>> {
		Box::pin(self.mget(ids))
	}

	fn fields<'a>(
		&'a self,
		filter: Option<&'a FieldFilter>,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(self.field_caps(filter))
	}

	fn field_values<'a>(
		&'a self,
		field: &'a str,
		prefix: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(self.terms(field, prefix))
	}

	fn test_connection(&self) -> BoxFuture<'_, ConnectionStatus> {
		Box::pin(self.ping())
	}
}

fn search_body(query: &EsQuery, result_depth: u32) -> Map<String, Value> {
	let mut body = query.body().clone();

	body.entry("size").or_insert_with(|| Value::from(result_depth));

	body
}

fn parse_search_response(json: &Value) -> Result<QueryResponse> {
	let hits = json.get("hits").ok_or_else(|| Error::InvalidResponse {
		message: "Search response is missing hits.".to_string(),
	})?;
	let raw_hits =
		hits.get("hits").and_then(Value::as_array).ok_or_else(|| Error::InvalidResponse {
			message: "Search response is missing hits.hits array.".to_string(),
		})?;
	let mut results = Vec::with_capacity(raw_hits.len());

	for hit in raw_hits {
		let id = hit.get("_id").and_then(crate::hit_id).ok_or_else(|| Error::InvalidResponse {
			message: "Search hit is missing _id.".to_string(),
		})?;

		results.push(SearchHit { id, explanation: hit.get("_explanation").cloned() });
	}

	let total_results = hits.get("total").and_then(|total| match total {
		Value::Object(total) => total.get("value").and_then(Value::as_u64),
		other => other.as_u64(),
	});

	Ok(QueryResponse {
		took_ms: json.get("took").and_then(Value::as_u64),
		total_results,
		results,
		error: degradation(json),
	})
}

fn degradation(json: &Value) -> Option<String> {
	let mut problems = Vec::new();
	let shards = json.get("_shards");
	let failed =
		shards.and_then(|shards| shards.get("failed")).and_then(Value::as_u64).unwrap_or(0);

	if failed > 0 {
		let total = shards.and_then(|shards| shards.get("total")).and_then(Value::as_u64);
		let reason = shards
			.and_then(|shards| shards.get("failures"))
			.and_then(|failures| failures.get(0))
			.and_then(|failure| failure.get("reason"))
			.and_then(|reason| reason.get("reason").or(Some(reason)))
			.and_then(Value::as_str);
		let mut message = match total {
			Some(total) => format!("{failed} of {total} shards failed."),
			None => format!("{failed} shards failed."),
		};

		if let Some(reason) = reason {
			message.push_str(&format!(" First failure: {reason}"));
		}

		problems.push(message);
	}
	if json.get("timed_out").and_then(Value::as_bool).unwrap_or(false) {
		problems.push("Search timed out before all shards responded.".to_string());
	}

	(!problems.is_empty()).then(|| problems.join(" "))
}

fn parse_mget_response(json: &Value) -> Result<Vec<Document>> {
	let docs = json.get("docs").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Multi-get response is missing docs array.".to_string() }
	})?;
	let documents = docs
		.iter()
		.filter(|doc| doc.get("found").and_then(Value::as_bool).unwrap_or(false))
		.filter_map(|doc| {
			let id = doc.get("_id").and_then(crate::hit_id)?;
			let fields = doc.get("_source").and_then(Value::as_object).cloned().unwrap_or_default();

			Some(Document { id, fields })
		})
		.collect();

	Ok(documents)
}

fn parse_field_caps_response(json: &Value, filter: Option<&FieldFilter>) -> Result<Vec<String>> {
	let fields = json.get("fields").and_then(Value::as_object).ok_or_else(|| {
		Error::InvalidResponse {
			message: "Field capabilities response is missing fields.".to_string(),
		}
	})?;
	let mut names: Vec<String> = fields
		.iter()
		.filter(|(name, _)| !name.starts_with('_'))
		.filter(|(_, caps)| {
			let Some(filter) = filter else {
				return true;
			};
			let Some(caps) = caps.as_object() else {
				return false;
			};
			let type_ok =
				filter.types.is_empty() || caps.keys().any(|kind| filter.types.contains(kind));
			let aggregatable_ok = !filter.aggregatable_only
				|| caps.values().any(|cap| {
					cap.get("aggregatable").and_then(Value::as_bool).unwrap_or(false)
				});

			type_ok && aggregatable_ok
		})
		.map(|(name, _)| name.clone())
		.collect();

	names.sort();

	Ok(names)
}

fn parse_terms_response(json: &Value) -> Result<Vec<String>> {
	let buckets = json
		.pointer("/aggregations/values/buckets")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Terms aggregation response is missing buckets.".to_string(),
		})?;

	Ok(buckets.iter().filter_map(|bucket| bucket.get("key").and_then(crate::hit_id)).collect())
}

/// Escapes Lucene regular expression operators so a prefix matches literally.
fn escape_regex(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(
			ch,
			'.' | '?' | '+' | '*' | '|' | '{' | '}' | '[' | ']' | '(' | ')' | '"' | '\\' | '#'
				| '@' | '&' | '<' | '>' | '~'
		) {
			escaped.push('\\');
		}

		escaped.push(ch);
	}

	escaped
}
