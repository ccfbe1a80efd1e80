pub mod graphql;

mod error;

pub use error::{Error, Result};

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, USER_AGENT};
use serde_json::{Map, Value};

pub fn auth_headers(
	api_key: &str,
	user_agent: &str,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	headers.insert(USER_AGENT, user_agent.parse()?);
	headers.insert(ACCEPT, "application/json".parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Masks bearer tokens and `key=value` style secrets.
pub fn redact(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") || raw.eq_ignore_ascii_case("token") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "access_token", "password", "secret", "token"] {
			if lowered.contains(key) && (raw.contains('=') || raw.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = raw.split(sep).next().unwrap_or(raw);

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		if lowered.starts_with("ghp_") || lowered.starts_with("github_pat_") {
			word = "[REDACTED]".to_string();
		}

		parts.push(word);
	}

	parts.join(" ")
}
