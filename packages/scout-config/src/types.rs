use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub provider: ProviderConfig,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub enrich: Enrich,
	#[serde(default)]
	pub retry: Retry,
	#[serde(default)]
	pub budget: Budget,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	#[serde(default = "default_api_base")]
	pub api_base: String,
	#[serde(default = "default_graphql_path")]
	pub path: String,
	/// Optional. Resolved from the environment variable named by `api_key_env` when absent.
	pub api_key: Option<String>,
	#[serde(default = "default_api_key_env")]
	pub api_key_env: String,
	#[serde(default = "default_user_agent")]
	pub user_agent: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Raw search qualifier string, e.g. `location:prague followers:>5`.
	pub filter: Option<String>,
	/// Used to build an OR-joined `location:` filter when `filter` is absent.
	pub locations: Vec<String>,
	pub page_size: u32,
	pub max_pages: u32,
	pub inter_page_delay_ms: u64,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			filter: None,
			locations: Vec::new(),
			page_size: 100,
			max_pages: 10,
			inter_page_delay_ms: 1_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Enrich {
	pub batch_size: u32,
	pub recovery_enabled: bool,
	pub recovery_batch_size: u32,
	pub inter_batch_delay_ms: u64,
	pub activity_window_days: u32,
	pub repositories_per_identifier: u32,
	pub exclude_forks: bool,
}
impl Default for Enrich {
	fn default() -> Self {
		Self {
			batch_size: 15,
			recovery_enabled: true,
			recovery_batch_size: 10,
			inter_batch_delay_ms: 500,
			activity_window_days: 365,
			repositories_per_identifier: 5,
			exclude_forks: true,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retry {
	/// Physical attempts per request, including the first one.
	pub max_attempts: u32,
	/// One of `linear` or `exponential`.
	pub backoff: String,
	pub base_delay_ms: u64,
	/// Linear mode only.
	pub increment_ms: u64,
	/// Exponential mode only.
	pub max_delay_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff: "linear".to_string(),
			base_delay_ms: 5_000,
			increment_ms: 2_000,
			max_delay_ms: 60_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Budget {
	/// Requests pause until the reported reset time once the remaining points fall below this.
	pub min_remaining: u32,
}
impl Default for Budget {
	fn default() -> Self {
		Self { min_remaining: 100 }
	}
}

fn default_api_base() -> String {
	"https://api.github.com".to_string()
}

fn default_graphql_path() -> String {
	"/graphql".to_string()
}

fn default_api_key_env() -> String {
	"GITHUB_API_TOKEN".to_string()
}

fn default_user_agent() -> String {
	"scout-harvest".to_string()
}

fn default_timeout_ms() -> u64 {
	60_000
}
