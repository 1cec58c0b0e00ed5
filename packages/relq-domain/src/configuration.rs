use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{judgement::JudgementSource, ruleset::RulesetRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
	pub template_id: Uuid,
	pub revision: i32,
}

/// Fixed pairing of one template revision, ruleset versions, knob values, and weighted
/// judgement sources. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfiguration {
	pub search_configuration_id: Uuid,
	pub template: TemplateRef,
	pub knobs: BTreeMap<String, f64>,
	pub rulesets: Vec<RulesetRef>,
	pub judgement_sources: Vec<JudgementSource>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTemplate {
	pub template_id: Uuid,
	pub revision: i32,
	pub search_endpoint_id: Uuid,
	pub body: String,
	/// Default knob values; a configuration's knobs override them by name.
	pub knobs: BTreeMap<String, f64>,
	pub ltr_model: Option<String>,
}
impl QueryTemplate {
	pub fn resolve_knobs(&self, overrides: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
		let mut knobs = self.knobs.clone();

		knobs.extend(overrides.iter().map(|(name, value)| (name.clone(), *value)));

		knobs
	}
}
