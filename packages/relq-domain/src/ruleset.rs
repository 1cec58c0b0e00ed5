use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RulesetRef {
	pub ruleset_id: Uuid,
	pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
	pub ruleset_id: Uuid,
	pub version: i32,
	pub name: String,
	pub rules: Vec<Rule>,
}
impl Ruleset {
	pub fn active_rules(&self) -> impl Iterator<Item = &Rule> {
		self.rules.iter().filter(|rule| rule.enabled)
	}
}

/// A trigger expression plus the query rewrites applied when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
	pub expression: String,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	pub instructions: Vec<Instruction>,
}
impl Rule {
	pub fn validate(&self) -> Result<()> {
		if self.expression.trim().is_empty() {
			return Err(Error::InvalidInstruction {
				kind: "rule",
				message: "rule expression must be non-empty.".to_string(),
			});
		}

		self.instructions.iter().try_for_each(Instruction::validate)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
	/// Adds alternative terms to the query. Directed synonyms only expand the trigger side.
	Synonym {
		terms: Vec<String>,
		#[serde(default)]
		directed: bool,
	},
	/// Boosts (positive) or buries (negative) documents matching `criteria`.
	UpDown { criteria: String, boost: f64 },
	Filter {
		field: String,
		values: Vec<String>,
		#[serde(default)]
		exclude: bool,
	},
	Delete { terms: Vec<String> },
	FacetFilter { field: String, value: String },
	Substitute { from: String, to: String },
}
impl Instruction {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Synonym { .. } => "synonym",
			Self::UpDown { .. } => "up_down",
			Self::Filter { .. } => "filter",
			Self::Delete { .. } => "delete",
			Self::FacetFilter { .. } => "facet_filter",
			Self::Substitute { .. } => "substitute",
		}
	}

	pub fn validate(&self) -> Result<()> {
		let invalid = |message: &str| {
			Err(Error::InvalidInstruction { kind: self.kind(), message: message.to_string() })
		};

		match self {
			Self::Synonym { terms, .. } | Self::Delete { terms } => {
				if terms.is_empty() || terms.iter().any(|term| term.trim().is_empty()) {
					return invalid("terms must be non-empty.");
				}
			},
			Self::UpDown { criteria, boost } => {
				if criteria.trim().is_empty() {
					return invalid("criteria must be non-empty.");
				}
				if !boost.is_finite() || *boost == 0.0 {
					return invalid("boost must be a finite, non-zero number.");
				}
			},
			Self::Filter { field, values, .. } => {
				if field.trim().is_empty() {
					return invalid("field must be non-empty.");
				}
				if values.is_empty() {
					return invalid("values must be non-empty.");
				}
			},
			Self::FacetFilter { field, value } => {
				if field.trim().is_empty() || value.trim().is_empty() {
					return invalid("field and value must be non-empty.");
				}
			},
			Self::Substitute { from, .. } => {
				if from.trim().is_empty() {
					return invalid("from must be non-empty.");
				}
			},
		}

		Ok(())
	}
}

fn default_enabled() -> bool {
	true
}
