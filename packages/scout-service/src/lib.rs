pub mod enrich;
pub mod harvest;
pub mod recovery;
pub mod search;
pub mod transport;

mod error;

pub use enrich::{EnrichOutcome, EnrichParams};
pub use error::{Error, Result};
pub use harvest::{HarvestReport, Harvester};
pub use recovery::RecoveryOutcome;
pub use search::{SearchOutcome, SearchParams, SearchSummary, StopReason};
pub use transport::{Backoff, RateLimitedTransport, RetryPolicy, SharedBudget, TransportError};

use std::{future::Future, pin::Pin, time::Duration};

use reqwest::Client;
use time::OffsetDateTime;

use scout_config::ProviderConfig;
use scout_domain::GraphqlRequest;
use scout_providers::graphql::{self, Attempt};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Performs exactly one physical request.
pub trait GraphqlBackend
where
	Self: Send + Sync,
{
	fn send<'a>(&'a self, request: &'a GraphqlRequest) -> BoxFuture<'a, Attempt>;
}

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;

	fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

pub struct TokioClock;
impl Clock for TokioClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}

	fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
		Box::pin(tokio::time::sleep(duration))
	}
}

/// Posts to the configured GraphQL endpoint with reqwest.
pub struct HttpBackend {
	client: Client,
	url: String,
}
impl HttpBackend {
	pub fn new(cfg: &ProviderConfig) -> Result<Self> {
		Ok(Self { client: graphql::client(cfg)?, url: graphql::endpoint(cfg) })
	}
}
impl GraphqlBackend for HttpBackend {
	fn send<'a>(&'a self, request: &'a GraphqlRequest) -> BoxFuture<'a, Attempt> {
		Box::pin(graphql::send(&self.client, &self.url, request))
	}
}
