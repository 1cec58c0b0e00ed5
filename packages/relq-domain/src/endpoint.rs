use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendType {
	Elasticsearch,
	OpenSearch,
	Solr,
}
impl BackendType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Elasticsearch => "ELASTICSEARCH",
			Self::OpenSearch => "OPENSEARCH",
			Self::Solr => "SOLR",
		}
	}

	/// Backends whose queries are JSON DSL documents produced by the expansion service.
	pub fn is_elasticsearch_family(&self) -> bool {
		matches!(self, Self::Elasticsearch | Self::OpenSearch)
	}
}
impl fmt::Display for BackendType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for BackendType {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_uppercase().as_str() {
			"ELASTICSEARCH" | "ES" => Ok(Self::Elasticsearch),
			"OPENSEARCH" | "OS" => Ok(Self::OpenSearch),
			"SOLR" => Ok(Self::Solr),
			_ => Err(Error::UnsupportedEndpoint { endpoint_type: raw.to_string() }),
		}
	}
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
	#[default]
	None,
	Basic {
		username: String,
		password: String,
	},
	ApiKey {
		key: String,
	},
}
impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::None => f.write_str("None"),
			Self::Basic { username, .. } =>
				f.debug_struct("Basic").field("username", username).finish_non_exhaustive(),
			Self::ApiKey { .. } => f.debug_struct("ApiKey").finish_non_exhaustive(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEndpoint {
	pub search_endpoint_id: Uuid,
	pub name: String,
	/// Raw type label as stored; parsed with [`SearchEndpoint::backend_type`].
	pub endpoint_type: String,
	pub base_url: String,
	/// Elasticsearch/OpenSearch index or Solr collection.
	pub index: String,
	#[serde(default, skip_serializing)]
	pub credentials: Credentials,
}
impl SearchEndpoint {
	pub fn backend_type(&self) -> Result<BackendType, Error> {
		self.endpoint_type.parse()
	}
}
