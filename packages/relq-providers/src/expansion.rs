//! Turns a template, its knob values, active rulesets, and a phrase into a backend-native query.
//!
//! Solr queries are expanded locally by textual substitution. Elasticsearch-family queries are
//! produced by the remote expansion service. [`ExpandedQuery`] can only be built here, so an
//! adapter never receives a query that did not pass through expansion.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use reqwest::Client;
use serde_json::{Map, Value};
use url::form_urlencoded;

use relq_domain::{configuration::QueryTemplate, endpoint::BackendType, ruleset::Ruleset};

use crate::{BoxFuture, Error, Result};

/// Marks where the phrase lands in a Solr template.
pub const SOLR_QUERY_PLACEHOLDER: &str = "#$query##";

#[derive(Debug, Clone, PartialEq)]
pub enum ExpandedQuery {
	Elasticsearch(EsQuery),
	Solr(SolrQuery),
}
impl ExpandedQuery {
	pub fn family(&self) -> &'static str {
		match self {
			Self::Elasticsearch(_) => "elasticsearch",
			Self::Solr(_) => "solr",
		}
	}
}

/// Query DSL body for Elasticsearch and OpenSearch.
#[derive(Debug, Clone, PartialEq)]
pub struct EsQuery {
	body: Map<String, Value>,
}
impl EsQuery {
	pub(crate) fn new(body: Map<String, Value>) -> Self {
		Self { body }
	}

	pub fn body(&self) -> &Map<String, Value> {
		&self.body
	}
}

/// Decoded Solr request parameters, in template order.
#[derive(Debug, Clone, PartialEq)]
pub struct SolrQuery {
	params: Vec<(String, String)>,
}
impl SolrQuery {
	pub(crate) fn new(params: Vec<(String, String)>) -> Self {
		Self { params }
	}

	pub fn params(&self) -> &[(String, String)] {
		&self.params
	}

	pub fn has_param(&self, name: &str) -> bool {
		self.params.iter().any(|(key, _)| key == name)
	}
}

/// Remote expansion backend. Receives the wire request and returns the backend query JSON.
pub trait ExpansionService
where
	Self: Send + Sync,
{
	fn expand<'a>(&'a self, request: &'a Value) -> BoxFuture<'a, Result<Value>>;
}

pub struct HttpExpansionService {
	client: Client,
	url: String,
}
impl HttpExpansionService {
	pub fn new(cfg: &relq_config::Expansion) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
			.build()?;

		Ok(Self { client, url: format!("{}{}", cfg.api_base, cfg.path) })
	}

	async fn post(&self, request: &Value) -> Result<Value> {
		let res = self.client.post(&self.url).json(request).send().await?;

		crate::read_json(res).await
	}
}
impl ExpansionService for HttpExpansionService {
	fn expand<'a>(&'a self, request: &'a Value) -> BoxFuture<'a, Result<Value>> {
		Box::pin(self.post(request))
	}
}

#[derive(Clone)]
pub struct QueryExpander {
	remote: Arc<dyn ExpansionService>,
}
impl QueryExpander {
	pub fn new(remote: Arc<dyn ExpansionService>) -> Self {
		Self { remote }
	}

	pub fn from_config(cfg: &relq_config::Expansion) -> Result<Self> {
		Ok(Self::new(Arc::new(HttpExpansionService::new(cfg)?)))
	}

	/// `knobs` are the resolved values, template defaults already overridden by the
	/// configuration.
	pub async fn expand(
		&self,
		backend: BackendType,
		template: &QueryTemplate,
		knobs: &BTreeMap<String, f64>,
		rulesets: &[Ruleset],
		phrase: &str,
	) -> Result<ExpandedQuery> {
		match backend {
			BackendType::Solr => {
				let active = rulesets.iter().flat_map(Ruleset::active_rules).count();

				if active > 0 {
					tracing::debug!(
						phrase,
						active_rules = active,
						"Rulesets are not applied to Solr queries."
					);
				}

				Ok(ExpandedQuery::Solr(expand_solr(&template.body, knobs, phrase)))
			},
			BackendType::Elasticsearch | BackendType::OpenSearch => {
				let body = self.expand_remote(backend, template, knobs, rulesets, phrase).await?;

				Ok(ExpandedQuery::Elasticsearch(EsQuery::new(body)))
			},
		}
	}

	async fn expand_remote(
		&self,
		backend: BackendType,
		template: &QueryTemplate,
		knobs: &BTreeMap<String, f64>,
		rulesets: &[Ruleset],
		phrase: &str,
	) -> Result<Map<String, Value>> {
		let request =
			expansion_request(backend, template, knobs, rulesets, phrase).inspect_err(|err| {
				tracing::warn!(error = %err, phrase, "Query expansion request is invalid.");
			})?;
		let response = self.remote.expand(&request).await.map_err(|err| {
			tracing::warn!(error = %err, phrase, "Query expansion request failed.");

			Error::QueryExpansionFailed { message: err.to_string() }
		})?;

		match response {
			Value::Object(body) => Ok(body),
			other => {
				tracing::warn!(phrase, "Query expansion returned a non-object response.");

				Err(Error::QueryExpansionFailed {
					message: format!(
						"Expansion service returned {} instead of a JSON object.",
						json_kind(&other)
					),
				})
			},
		}
	}
}

/// Builds the expansion service request body for one phrase.
pub fn expansion_request(
	backend: BackendType,
	template: &QueryTemplate,
	knobs: &BTreeMap<String, f64>,
	rulesets: &[Ruleset],
	phrase: &str,
) -> Result<Value> {
	let mut rules = Vec::new();

	for rule in rulesets.iter().flat_map(Ruleset::active_rules) {
		rule.validate()?;
		rules.push(serde_json::to_value(rule)?);
	}

	Ok(serde_json::json!({
		"query": phrase,
		"search_configuration": {
			"search_endpoint_type": backend.as_str(),
			"template": template.body,
			"config": { "ltr_model": template.ltr_model },
			"rules": rules,
			"knobs": knobs,
		},
	}))
}

/// Splits a Solr template into form-decoded parameters, then substitutes knob tokens
/// (`##name##`) and the phrase placeholder inside each value. Substituting after the split keeps
/// `&` and `=` in a phrase from creating new parameters.
pub fn expand_solr(template: &str, knobs: &BTreeMap<String, f64>, phrase: &str) -> SolrQuery {
	let params = template
		.trim()
		.trim_start_matches('?')
		.split('&')
		.filter(|pair| !pair.trim().is_empty())
		.filter_map(|pair| form_urlencoded::parse(pair.as_bytes()).next())
		.map(|(key, value)| {
			let mut value = value.into_owned();

			for (name, knob) in knobs {
				value = value.replace(&format!("##{name}##"), &knob.to_string());
			}

			(key.trim().to_string(), value.replace(SOLR_QUERY_PLACEHOLDER, phrase))
		})
		.collect();

	SolrQuery::new(params)
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use relq_domain::ruleset::{Instruction, Rule};

	fn template(body: &str) -> QueryTemplate {
		QueryTemplate {
			template_id: Default::default(),
			revision: 1,
			search_endpoint_id: Default::default(),
			body: body.to_string(),
			knobs: BTreeMap::new(),
			ltr_model: Some("ltr-v2".to_string()),
		}
	}

	fn ruleset(rules: Vec<Rule>) -> Ruleset {
		Ruleset { ruleset_id: Default::default(), version: 1, name: "merch".to_string(), rules }
	}

	#[test]
	fn substitutes_phrase_and_knobs_into_solr_params() {
		let knobs = BTreeMap::from([("title_boost".to_string(), 2.5)]);
		let template = "q=#$query##&defType=edismax&qf=title^##title_boost## body";
		let query = expand_solr(template, &knobs, "usb c");

		assert_eq!(
			query.params(),
			&[
				("q".to_string(), "usb c".to_string()),
				("defType".to_string(), "edismax".to_string()),
				("qf".to_string(), "title^2.5 body".to_string()),
			]
		);
		assert!(query.has_param("defType"));
		assert!(!query.has_param("rows"));
	}

	#[test]
	fn decodes_url_encoded_solr_templates() {
		let knobs = BTreeMap::from([("boost".to_string(), 3.0)]);
		let template = "q=#$query##&qf=title%5E2+body&bq=brand:acme%5E##boost##&fq=type:book";
		let query = expand_solr(template, &knobs, "c++ primer");

		assert_eq!(
			query.params(),
			&[
				("q".to_string(), "c++ primer".to_string()),
				("qf".to_string(), "title^2 body".to_string()),
				("bq".to_string(), "brand:acme^3".to_string()),
				("fq".to_string(), "type:book".to_string()),
			]
		);
	}

	#[test]
	fn phrase_with_separators_stays_one_param() {
		let query = expand_solr("q=#$query##", &BTreeMap::new(), "salt & pepper=spice");

		assert_eq!(query.params(), &[("q".to_string(), "salt & pepper=spice".to_string())]);
	}

	#[test]
	fn request_carries_active_rules_only() {
		let enabled = Rule {
			expression: "laptop".to_string(),
			enabled: true,
			instructions: vec![Instruction::Synonym {
				terms: vec!["notebook".to_string()],
				directed: false,
			}],
		};
		let disabled = Rule { enabled: false, ..enabled.clone() };
		let request = expansion_request(
			BackendType::OpenSearch,
			&template("{\"query\":{}}"),
			&BTreeMap::from([("boost".to_string(), 1.0)]),
			&[ruleset(vec![enabled, disabled])],
			"laptop",
		)
		.expect("Expected a valid request.");

		assert_eq!(request["query"], "laptop");
		assert_eq!(request["search_configuration"]["search_endpoint_type"], "OPENSEARCH");
		assert_eq!(request["search_configuration"]["config"]["ltr_model"], "ltr-v2");
		assert_eq!(request["search_configuration"]["knobs"]["boost"], 1.0);
		assert_eq!(request["search_configuration"]["rules"].as_array().map(Vec::len), Some(1));
	}

	#[test]
	fn invalid_instruction_fails_expansion() {
		let rule = Rule {
			expression: "laptop".to_string(),
			enabled: true,
			instructions: vec![Instruction::Delete { terms: Vec::new() }],
		};
		let err = expansion_request(
			BackendType::Elasticsearch,
			&template("{}"),
			&BTreeMap::new(),
			&[ruleset(vec![rule])],
			"laptop",
		)
		.expect_err("Expected expansion failure.");

		assert!(matches!(err, Error::QueryExpansionFailed { .. }), "Unexpected error: {err:?}");
	}
}
