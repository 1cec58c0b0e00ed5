mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Backends, Config, Evaluation, Expansion, Postgres, Service, Storage};

use std::{fs, path::Path};

use relq_domain::scoring::Metric;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.expansion.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "expansion.api_base must be non-empty.".to_string(),
		});
	}
	if !cfg.expansion.path.starts_with('/') {
		return Err(Error::Validation {
			message: "expansion.path must start with '/'.".to_string(),
		});
	}

	for (label, timeout_ms) in
		[("expansion", cfg.expansion.timeout_ms), ("backends", cfg.backends.timeout_ms)]
	{
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label}.timeout_ms must be greater than zero."),
			});
		}
	}
	for (label, headers) in [
		("expansion", &cfg.expansion.default_headers),
		("backends", &cfg.backends.default_headers),
	] {
		if headers.values().any(|value| !value.is_string()) {
			return Err(Error::Validation {
				message: format!("{label}.default_headers values must be strings."),
			});
		}
	}

	if cfg.backends.result_depth == 0 {
		return Err(Error::Validation {
			message: "backends.result_depth must be greater than zero.".to_string(),
		});
	}
	if cfg.evaluation.concurrency == 0 {
		return Err(Error::Validation {
			message: "evaluation.concurrency must be greater than zero.".to_string(),
		});
	}
	if !cfg.evaluation.relevance_threshold.is_finite() {
		return Err(Error::Validation {
			message: "evaluation.relevance_threshold must be a finite number.".to_string(),
		});
	}
	if cfg.evaluation.relevance_threshold <= 0.0 {
		return Err(Error::Validation {
			message: "evaluation.relevance_threshold must be greater than zero.".to_string(),
		});
	}
	if cfg.evaluation.metrics.is_empty() {
		return Err(Error::Validation {
			message: "evaluation.metrics must be non-empty.".to_string(),
		});
	}

	for label in &cfg.evaluation.metrics {
		if label.parse::<Metric>().is_err() {
			return Err(Error::Validation {
				message: format!(
					"evaluation.metrics entry {label:?} must look like ap@K, p@K, r@K, or ndcg@K."
				),
			});
		}
	}

	if !cfg.evaluation.metrics.iter().any(|label| label == &cfg.evaluation.combined_metric) {
		return Err(Error::Validation {
			message: "evaluation.combined_metric must be one of evaluation.metrics.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.expansion.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.expansion.api_key = None;
	}

	cfg.expansion.api_base = cfg.expansion.api_base.trim_end_matches('/').to_string();

	for label in &mut cfg.evaluation.metrics {
		*label = label.trim().to_lowercase();
	}

	cfg.evaluation.combined_metric = cfg.evaluation.combined_metric.trim().to_lowercase();

	let mut seen = std::collections::HashSet::new();

	cfg.evaluation.metrics.retain(|label| seen.insert(label.clone()));
}
