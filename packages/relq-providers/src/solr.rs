use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use relq_domain::{
	endpoint::{Credentials, SearchEndpoint},
	execution::SearchHit,
};

use crate::{
	BackendSettings, BoxFuture, ConnectionStatus, Document, Error, FieldFilter, QueryInterface,
	QueryResponse, Result,
	expansion::{ExpandedQuery, SolrQuery},
};

const FIELD_VALUES_LIMIT: usize = 100;
const TERMS_SEPARATORS: [&str; 4] = [",", "|", ";", "\u{1f}"];

pub struct SolrInterface {
	client: Client,
	base_url: String,
	collection: String,
	credentials: Credentials,
	result_depth: u32,
}
impl SolrInterface {
	pub fn new(endpoint: &SearchEndpoint, settings: &BackendSettings) -> Result<Self> {
		Ok(Self {
			client: crate::backend_client(settings)?,
			base_url: endpoint.base_url.clone(),
			collection: endpoint.index.clone(),
			credentials: endpoint.credentials.clone(),
			result_depth: settings.result_depth,
		})
	}

	fn get(&self, path: &str) -> RequestBuilder {
		let url = crate::endpoint_url(&self.base_url, &self.collection, path);

		crate::authorize(self.client.get(url), &self.credentials)
	}

	async fn select(&self, query: &SolrQuery) -> Result<QueryResponse> {
		let params = select_params(query, self.result_depth);
		let res = self.get("select").query(&params).send().await?;
		let json = crate::read_json(res).await?;

		parse_select_response(&json)
	}

	async fn lookup(&self, ids: &[String]) -> Result<Vec<Document>> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}

		let q = terms_lookup(ids);
		let rows = ids.len().to_string();
		let res = self
			.get("select")
			.query(&[("q", q.as_str()), ("rows", rows.as_str()), ("wt", "json")])
			.send()
			.await?;
		let json = crate::read_json(res).await?;

		parse_documents(&json)
	}

	async fn schema_fields(&self, filter: Option<&FieldFilter>) -> Result<Vec<String>> {
		let res = self.get("schema/fields").query(&[("wt", "json")]).send().await?;
		let json = crate::read_json(res).await?;

		parse_schema_fields(&json, filter)
	}

	async fn facet_values(&self, field: &str, prefix: Option<&str>) -> Result<Vec<String>> {
		let limit = FIELD_VALUES_LIMIT.to_string();
		let mut params = vec![
			("q", "*:*"),
			("rows", "0"),
			("wt", "json"),
			("facet", "true"),
			("facet.field", field),
			("facet.limit", limit.as_str()),
			("facet.mincount", "1"),
		];

		if let Some(prefix) = prefix.filter(|prefix| !prefix.is_empty()) {
			params.push(("facet.prefix", prefix));
		}

		let res = self.get("select").query(&params).send().await?;
		let json = crate::read_json(res).await?;

		parse_facet_values(&json, field)
	}

	async fn ping(&self) -> ConnectionStatus {
		let outcome = match self.get("admin/ping").query(&[("wt", "json")]).send().await {
			Ok(res) => crate::read_json(res).await,
			Err(err) => Err(Error::from(err)),
		};

		match outcome {
			Ok(json) if json.get("status").and_then(Value::as_str) == Some("OK") =>
				ConnectionStatus {
					success: true,
					message: format!("Connected to collection {}.", self.collection),
				},
			Ok(json) => ConnectionStatus {
				success: false,
				message: format!(
					"Ping of collection {} returned status {}.",
					self.collection,
					json.get("status").and_then(Value::as_str).unwrap_or("unknown")
				),
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					collection = %self.collection,
					"Search endpoint is unreachable."
				);

				ConnectionStatus { success: false, message: err.to_string() }
			},
		}
	}
}
impl QueryInterface for SolrInterface {
	fn execute_query<'a>(
		&'a self,
		query: &'a ExpandedQuery,
	) -> BoxFuture<'a, Result<QueryResponse>> {
		Box::pin(async move {
			match query {
				ExpandedQuery::Solr(query) => self.select(query).await,
				other => Err(Error::InvalidConfig {
					message: format!("Solr endpoints cannot execute {} queries.", other.family()),
				}),
			}
		})
	}

	fn documents_by_id<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, Result<Vec<Document>>> {
		Box::pin(self.lookup(ids))
	}

	fn fields<'a>(
		&'a self,
		filter: Option<&'a FieldFilter>,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(self.schema_fields(filter))
	}

	fn field_values<'a>(
		&'a self,
		field: &'a str,
		prefix: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(self.facet_values(field, prefix))
	}

	fn test_connection(&self) -> BoxFuture<'_, ConnectionStatus> {
		Box::pin(self.ping())
	}
}

fn select_params(query: &SolrQuery, result_depth: u32) -> Vec<(String, String)> {
	let mut params = query.params().to_vec();

	let forced = [("wt", "json"), ("debugQuery", "true"), ("debug.explain.structured", "true")];

	for (key, value) in forced {
		params.retain(|(existing, _)| existing != key);
		params.push((key.to_string(), value.to_string()));
	}

	if !query.has_param("rows") {
		params.push(("rows".to_string(), result_depth.to_string()));
	}

	params
}

/// Builds a `{!terms f=id}` query whose separator occurs in none of the ids.
fn terms_lookup(ids: &[String]) -> String {
	let separator = TERMS_SEPARATORS
		.into_iter()
		.find(|separator| ids.iter().all(|id| !id.contains(*separator)))
		.unwrap_or(TERMS_SEPARATORS[TERMS_SEPARATORS.len() - 1]);

	format!("{{!terms f=id separator='{separator}'}}{}", ids.join(separator))
}

fn parse_select_response(json: &Value) -> Result<QueryResponse> {
	let response = json.get("response").ok_or_else(|| Error::InvalidResponse {
		message: "Solr response is missing the response section.".to_string(),
	})?;
	let docs = response.get("docs").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Solr response is missing response.docs.".to_string() }
	})?;
	let explain = json.pointer("/debug/explain");
	let mut results = Vec::with_capacity(docs.len());

	for doc in docs {
		let id = doc.get("id").and_then(crate::hit_id).ok_or_else(|| Error::InvalidResponse {
			message: "Solr document is missing id.".to_string(),
		})?;
		let explanation = explain.and_then(|explain| explain.get(&id)).cloned();

		results.push(SearchHit { id, explanation });
	}

	let partial =
		json.pointer("/responseHeader/partialResults").and_then(Value::as_bool).unwrap_or(false);

	Ok(QueryResponse {
		took_ms: json.pointer("/responseHeader/QTime").and_then(Value::as_u64),
		total_results: response.get("numFound").and_then(Value::as_u64),
		results,
		error: partial.then(|| "Solr returned partial results.".to_string()),
	})
}

fn parse_documents(json: &Value) -> Result<Vec<Document>> {
	let docs = json.pointer("/response/docs").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Solr response is missing response.docs.".to_string() }
	})?;
	let documents = docs
		.iter()
		.filter_map(|doc| {
			let fields = doc.as_object()?.clone();
			let id = fields.get("id").and_then(crate::hit_id)?;

			Some(Document { id, fields })
		})
		.collect();

	Ok(documents)
}

fn parse_schema_fields(json: &Value, filter: Option<&FieldFilter>) -> Result<Vec<String>> {
	let fields = json.get("fields").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Solr schema response is missing fields.".to_string() }
	})?;
	let mut names: Vec<String> = fields
		.iter()
		.filter(|field| {
			let Some(filter) = filter else {
				return true;
			};
			let kind = field.get("type").and_then(Value::as_str).unwrap_or_default();
			let type_ok =
				filter.types.is_empty() || filter.types.iter().any(|wanted| wanted == kind);
			let aggregatable_ok = !filter.aggregatable_only
				|| field.get("docValues").and_then(Value::as_bool).unwrap_or(false);

			type_ok && aggregatable_ok
		})
		.filter_map(|field| field.get("name").and_then(Value::as_str))
		.filter(|name| !name.starts_with('_'))
		.map(str::to_string)
		.collect();

	names.sort();

	Ok(names)
}

/// Solr returns facet counts as a flat `[value, count, value, count, ...]` list.
fn parse_facet_values(json: &Value, field: &str) -> Result<Vec<String>> {
	let counts = json
		.get("facet_counts")
		.and_then(|counts| counts.get("facet_fields"))
		.and_then(|fields| fields.get(field))
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: format!("Solr facet response is missing values for {field}."),
		})?;

	Ok(counts.iter().step_by(2).filter_map(crate::hit_id).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn adds_debug_params_and_default_rows() {
		let query = SolrQuery::new(vec![
			("q".to_string(), "laptop".to_string()),
			("wt".to_string(), "xml".to_string()),
		]);
		let params = select_params(&query, 10);

		assert!(params.contains(&("q".to_string(), "laptop".to_string())));
		assert!(params.contains(&("wt".to_string(), "json".to_string())));
		assert!(!params.contains(&("wt".to_string(), "xml".to_string())));
		assert!(params.contains(&("debugQuery".to_string(), "true".to_string())));
		assert!(params.contains(&("rows".to_string(), "10".to_string())));
	}

	#[test]
	fn keeps_template_rows() {
		let query = SolrQuery::new(vec![("rows".to_string(), "3".to_string())]);
		let rows: Vec<_> =
			select_params(&query, 10).into_iter().filter(|(key, _)| key == "rows").collect();

		assert_eq!(rows, vec![("rows".to_string(), "3".to_string())]);
	}

	#[test]
	fn terms_lookup_avoids_separators_inside_ids() {
		let plain = vec!["doc1".to_string(), "doc2".to_string()];
		let commas = vec!["sku,1".to_string(), "sku|2".to_string()];

		assert_eq!(terms_lookup(&plain), "{!terms f=id separator=','}doc1,doc2");
		assert_eq!(terms_lookup(&commas), "{!terms f=id separator=';'}sku,1;sku|2");
	}

	#[test]
	fn normalizes_docs_and_structured_explanations() {
		let json = serde_json::json!({
			"responseHeader": { "status": 0, "QTime": 4 },
			"response": { "numFound": 17, "docs": [{ "id": "doc1" }, { "id": 2 }] },
			"debug": { "explain": { "doc1": { "value": 1.5, "description": "weight" } } }
		});
		let response = parse_select_response(&json).expect("parse failed");

		assert_eq!(response.took_ms, Some(4));
		assert_eq!(response.total_results, Some(17));
		assert_eq!(response.results[0].id, "doc1");
		assert_eq!(
			response.results[0].explanation.as_ref().map(|explanation| &explanation["value"]),
			Some(&serde_json::json!(1.5))
		);
		assert_eq!(response.results[1].id, "2");
		assert_eq!(response.results[1].explanation, None);
		assert_eq!(response.error, None);
	}

	#[test]
	fn partial_results_degrade_without_failing() {
		let json = serde_json::json!({
			"responseHeader": { "QTime": 9, "partialResults": true },
			"response": { "numFound": 1, "docs": [{ "id": "a" }] }
		});
		let response = parse_select_response(&json).expect("parse failed");

		assert_eq!(response.error.as_deref(), Some("Solr returned partial results."));
		assert_eq!(response.results.len(), 1);
	}

	#[test]
	fn filters_schema_fields() {
		let json = serde_json::json!({
			"fields": [
				{ "name": "_version_", "type": "plong", "docValues": true },
				{ "name": "title", "type": "text_general" },
				{ "name": "brand", "type": "string", "docValues": true },
				{ "name": "id", "type": "string" }
			]
		});
		let strings = FieldFilter { types: vec!["string".to_string()], aggregatable_only: false };
		let facetable = FieldFilter { types: Vec::new(), aggregatable_only: true };

		assert_eq!(parse_schema_fields(&json, None).expect("parse failed"), vec![
			"brand", "id", "title"
		]);
		assert_eq!(parse_schema_fields(&json, Some(&strings)).expect("parse failed"), vec![
			"brand", "id"
		]);
		assert_eq!(parse_schema_fields(&json, Some(&facetable)).expect("parse failed"), vec![
			"brand"
		]);
	}

	#[test]
	fn reads_flat_facet_counts() {
		let json = serde_json::json!({
			"facet_counts": { "facet_fields": { "brand": ["acme", 4, "globex", 2] } }
		});

		assert_eq!(parse_facet_values(&json, "brand").expect("parse failed"), vec![
			"acme", "globex"
		]);
	}
}
