//! GraphQL over HTTP, reduced to one classified [`Attempt`] per physical request.

use std::time::Duration;

use reqwest::{
	Client,
	header::{HeaderMap, RETRY_AFTER},
};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use scout_config::ProviderConfig;
use scout_domain::{FailureKind, GraphqlRequest, RateLimitSnapshot};

use crate::{Error, Result};

const MAX_MESSAGE_CHARS: usize = 300;
const TRANSIENT_ERROR_TYPES: [&str; 3] = ["SERVICE_UNAVAILABLE", "TIMEOUT", "INTERNAL"];
const LIMIT_ERROR_TYPES: [&str; 2] = ["RATE_LIMITED", "MAX_NODE_LIMIT_EXCEEDED"];
const LIMIT_MARKERS: [&str; 4] = ["resource limits", "complexity", "rate limit", "node limit"];
const NOT_FOUND_TYPE: &str = "NOT_FOUND";

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GraphqlError {
	#[serde(default)]
	pub message: String,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	#[serde(default)]
	pub path: Vec<Value>,
}
impl GraphqlError {
	/// First path segment. For an aliased batch this is the alias.
	pub fn alias(&self) -> Option<&str> {
		self.path.first().and_then(Value::as_str)
	}

	fn is_limit(&self) -> bool {
		self.kind.as_deref().is_some_and(|kind| LIMIT_ERROR_TYPES.contains(&kind))
			|| mentions_limit(&self.message)
	}

	fn is_transient(&self) -> bool {
		self.kind.as_deref().is_some_and(|kind| TRANSIENT_ERROR_TYPES.contains(&kind))
	}

	fn is_not_found(&self) -> bool {
		self.kind.as_deref() == Some(NOT_FOUND_TYPE)
	}
}

/// A response carrying usable `data`, possibly alongside per-field errors.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphqlResponse {
	pub data: Value,
	pub errors: Vec<GraphqlError>,
}
impl GraphqlResponse {
	/// An error reported against `alias` other than `NOT_FOUND`, as a recoverable rejection.
	pub fn alias_failure(&self, alias: &str) -> Option<Rejection> {
		self.errors
			.iter()
			.find(|error| error.alias() == Some(alias) && !error.is_not_found())
			.map(|error| graphql_rejection(FailureKind::RetryableGateway, error))
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
	pub kind: FailureKind,
	pub message: String,
}
impl Rejection {
	pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
		Self { kind, message: message.into() }
	}
}

/// Outcome of one physical request, with whatever rate figures came back with it.
#[derive(Clone, Debug, PartialEq)]
pub struct Attempt {
	pub outcome: std::result::Result<GraphqlResponse, Rejection>,
	pub rate_limit: Option<RateLimitSnapshot>,
}
impl Attempt {
	pub fn success(data: Value) -> Self {
		let rate_limit = RateLimitSnapshot::from_graphql_data(&data);

		Self { outcome: Ok(GraphqlResponse { data, errors: Vec::new() }), rate_limit }
	}

	pub fn rejected(kind: FailureKind, message: impl Into<String>) -> Self {
		Self { outcome: Err(Rejection::new(kind, message)), rate_limit: None }
	}

	pub fn with_rate_limit(mut self, rate_limit: RateLimitSnapshot) -> Self {
		self.rate_limit = Some(rate_limit);

		self
	}
}

/// Unclassified HTTP reply.
#[derive(Clone, Debug, PartialEq)]
pub struct RawReply {
	pub status: u16,
	pub text: String,
	pub rate_limit: Option<RateLimitSnapshot>,
	pub retry_after: bool,
}

#[derive(Deserialize)]
struct WireEnvelope {
	#[serde(default)]
	data: Value,
	#[serde(default)]
	errors: Vec<GraphqlError>,
}

pub fn client(cfg: &ProviderConfig) -> Result<Client> {
	let api_key = cfg.api_key.as_deref().ok_or_else(|| Error::InvalidConfig {
		message: format!("provider.api_key is not set and {} is empty.", cfg.api_key_env),
	})?;
	let headers = crate::auth_headers(api_key, &cfg.user_agent, &cfg.default_headers)?;

	Ok(Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.default_headers(headers)
		.build()?)
}

pub fn endpoint(cfg: &ProviderConfig) -> String {
	format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path)
}

pub async fn post(client: &Client, url: &str, request: &GraphqlRequest) -> Result<RawReply> {
	let res = client.post(url).json(request).send().await?;
	let status = res.status().as_u16();
	let rate_limit = rate_limit_from_headers(res.headers());
	let retry_after = res.headers().contains_key(RETRY_AFTER);
	let text = res.text().await?;

	Ok(RawReply { status, text, rate_limit, retry_after })
}

/// Posts `request` and classifies the result. Never fails; transport errors become rejections.
pub async fn send(client: &Client, url: &str, request: &GraphqlRequest) -> Attempt {
	match post(client, url, request).await {
		Ok(reply) => classify(reply),
		Err(err) => Attempt { outcome: Err(reject_error(&err)), rate_limit: None },
	}
}

pub fn reject_error(err: &Error) -> Rejection {
	let kind = if err.is_transient() { FailureKind::RetryableNetwork } else { FailureKind::Fatal };

	Rejection::new(kind, truncate(&crate::redact(&err.to_string())))
}

pub fn classify(reply: RawReply) -> Attempt {
	let body: Option<Value> = serde_json::from_str(&reply.text).ok();
	let body_rate = body
		.as_ref()
		.and_then(|body| body.get("data"))
		.and_then(RateLimitSnapshot::from_graphql_data);
	let rate_limit = merge_rate_limits(body_rate, reply.rate_limit);
	let outcome = classify_outcome(&reply, body, rate_limit.as_ref());

	Attempt { outcome, rate_limit }
}

fn classify_outcome(
	reply: &RawReply,
	body: Option<Value>,
	rate_limit: Option<&RateLimitSnapshot>,
) -> std::result::Result<GraphqlResponse, Rejection> {
	match reply.status {
		200..=299 => {},
		429 => return Err(http_rejection(FailureKind::RateOrComplexityExceeded, reply)),
		403 if reply.retry_after
			|| rate_limit.and_then(|rate| rate.remaining) == Some(0)
			|| mentions_limit(&reply.text) =>
			return Err(http_rejection(FailureKind::RateOrComplexityExceeded, reply)),
		500..=599 => return Err(http_rejection(FailureKind::RetryableGateway, reply)),
		_ => return Err(http_rejection(FailureKind::Fatal, reply)),
	}

	let Some(body) = body else {
		return Err(Rejection::new(
			FailureKind::RetryableNetwork,
			"Response body is not valid JSON.",
		));
	};
	let WireEnvelope { data, errors } = match serde_json::from_value(body) {
		Ok(envelope) => envelope,
		Err(err) =>
			return Err(Rejection::new(
				FailureKind::RetryableNetwork,
				format!("Response envelope is malformed: {err}."),
			)),
	};

	if let Some(error) = errors.iter().find(|error| error.is_limit()) {
		return Err(graphql_rejection(FailureKind::RateOrComplexityExceeded, error));
	}
	if data.is_object() {
		return Ok(GraphqlResponse { data, errors });
	}
	if let Some(error) = errors.iter().find(|error| error.is_transient()) {
		return Err(graphql_rejection(FailureKind::RetryableGateway, error));
	}
	if let Some(error) = errors.first() {
		return Err(graphql_rejection(FailureKind::Fatal, error));
	}

	Err(Rejection::new(FailureKind::RetryableNetwork, "Response carried neither data nor errors."))
}

fn http_rejection(kind: FailureKind, reply: &RawReply) -> Rejection {
	let snippet = truncate(&crate::redact(reply.text.trim()));

	if snippet.is_empty() {
		Rejection::new(kind, format!("HTTP {}.", reply.status))
	} else {
		Rejection::new(kind, format!("HTTP {}: {snippet}", reply.status))
	}
}

fn graphql_rejection(kind: FailureKind, error: &GraphqlError) -> Rejection {
	let message = truncate(&crate::redact(&error.message));

	match error.kind.as_deref() {
		Some(tag) => Rejection::new(kind, format!("{tag}: {message}")),
		None => Rejection::new(kind, message),
	}
}

fn mentions_limit(text: &str) -> bool {
	let lowered = text.to_ascii_lowercase();

	LIMIT_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn truncate(text: &str) -> String {
	if text.chars().count() <= MAX_MESSAGE_CHARS {
		return text.to_string();
	}

	let mut out: String = text.chars().take(MAX_MESSAGE_CHARS).collect();

	out.push_str("...");

	out
}

fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitSnapshot> {
	let read = |name: &str| {
		headers.get(name).and_then(|value| value.to_str().ok()).and_then(|value| value.trim().parse::<i64>().ok())
	};
	let snapshot = RateLimitSnapshot {
		cost: None,
		remaining: read("x-ratelimit-remaining").and_then(|value| u32::try_from(value).ok()),
		limit: read("x-ratelimit-limit").and_then(|value| u32::try_from(value).ok()),
		reset_at: read("x-ratelimit-reset")
			.and_then(|value| OffsetDateTime::from_unix_timestamp(value).ok()),
	};

	(!snapshot.is_empty()).then_some(snapshot)
}

/// Field-wise union; figures from the body win over headers.
fn merge_rate_limits(
	body: Option<RateLimitSnapshot>,
	headers: Option<RateLimitSnapshot>,
) -> Option<RateLimitSnapshot> {
	match (body, headers) {
		(Some(body), Some(headers)) => Some(RateLimitSnapshot {
			cost: body.cost.or(headers.cost),
			remaining: body.remaining.or(headers.remaining),
			limit: body.limit.or(headers.limit),
			reset_at: body.reset_at.or(headers.reset_at),
		}),
		(body, headers) => body.or(headers),
	}
}
