mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Budget, Config, Enrich, ProviderConfig, Retry, Search, Service};

use std::{env, fs, path::Path};

pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_ACTIVITY_WINDOW_DAYS: u32 = 365;
pub const MAX_REPOSITORIES_PER_IDENTIFIER: u32 = 20;
pub const MAX_ATTEMPTS: u32 = 10;

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
	if cfg.provider.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(true) {
		return Err(Error::Validation {
			message: format!(
				"provider.api_key must be set, either in the config file or via {}.",
				cfg.provider.api_key_env
			),
		});
	}
	if cfg.provider.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "provider.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.provider.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "provider.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (key, value) in &cfg.provider.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("provider.default_headers.{key} must be a string."),
			});
		}
	}

	if cfg.search.filter.is_none() && cfg.search.locations.is_empty() {
		return Err(Error::Validation {
			message: "search.filter or search.locations must be provided.".to_string(),
		});
	}
	if !(1..=MAX_PAGE_SIZE).contains(&cfg.search.page_size) {
		return Err(Error::Validation {
			message: format!("search.page_size must be in the range 1-{MAX_PAGE_SIZE}."),
		});
	}
	if cfg.search.max_pages == 0 {
		return Err(Error::Validation {
			message: "search.max_pages must be greater than zero.".to_string(),
		});
	}
	if cfg.enrich.batch_size == 0 {
		return Err(Error::Validation {
			message: "enrich.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.enrich.recovery_batch_size == 0 {
		return Err(Error::Validation {
			message: "enrich.recovery_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.enrich.recovery_batch_size > cfg.enrich.batch_size {
		return Err(Error::Validation {
			message: "enrich.recovery_batch_size must not exceed enrich.batch_size.".to_string(),
		});
	}
	if !(1..=MAX_ACTIVITY_WINDOW_DAYS).contains(&cfg.enrich.activity_window_days) {
		return Err(Error::Validation {
			message: format!(
				"enrich.activity_window_days must be in the range 1-{MAX_ACTIVITY_WINDOW_DAYS}."
			),
		});
	}
	if !(1..=MAX_REPOSITORIES_PER_IDENTIFIER).contains(&cfg.enrich.repositories_per_identifier) {
		return Err(Error::Validation {
			message: format!(
				"enrich.repositories_per_identifier must be in the range 1-{MAX_REPOSITORIES_PER_IDENTIFIER}."
			),
		});
	}
	if !(1..=MAX_ATTEMPTS).contains(&cfg.retry.max_attempts) {
		return Err(Error::Validation {
			message: format!("retry.max_attempts must be in the range 1-{MAX_ATTEMPTS}."),
		});
	}
	if !matches!(cfg.retry.backoff.as_str(), "linear" | "exponential") {
		return Err(Error::Validation {
			message: "retry.backoff must be one of linear or exponential.".to_string(),
		});
	}
	if cfg.retry.max_delay_ms < cfg.retry.base_delay_ms {
		return Err(Error::Validation {
			message: "retry.max_delay_ms must be greater than or equal to retry.base_delay_ms."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.search.filter.as_deref().map(|filter| filter.trim().is_empty()).unwrap_or(false) {
		cfg.search.filter = None;
	}

	cfg.search.locations.retain(|location| !location.trim().is_empty());

	if cfg.provider.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.provider.api_key = None;
	}
	if cfg.provider.api_key.is_none() {
		cfg.provider.api_key =
			env::var(&cfg.provider.api_key_env).ok().filter(|key| !key.trim().is_empty());
	}
}
