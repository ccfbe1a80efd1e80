//! Retry, backoff and rate-budget handling around a [`GraphqlBackend`].

use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use scout_domain::{FailureCause, FailureKind, GraphqlRequest, RateBudget, RateLimitSnapshot};
use scout_providers::graphql::{Attempt, GraphqlResponse, Rejection};

use crate::{Clock, GraphqlBackend};

/// Budget resets are hourly; a longer pause means the reported reset time is bogus.
const MAX_BUDGET_PAUSE: Duration = Duration::from_secs(3_600);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
	Linear { base: Duration, increment: Duration },
	Exponential { base: Duration, max: Duration },
}
impl Backoff {
	/// Delay before retry `retry`, 1-based.
	pub fn delay(&self, retry: u32) -> Duration {
		let step = retry.saturating_sub(1);

		match *self {
			Self::Linear { base, increment } => base.saturating_add(increment.saturating_mul(step)),
			Self::Exponential { base, max } =>
				base.saturating_mul(2_u32.saturating_pow(step)).min(max),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Physical attempts, including the first.
	pub max_attempts: u32,
	pub backoff: Backoff,
}
impl RetryPolicy {
	pub fn from_config(cfg: &scout_config::Retry) -> Self {
		let base = Duration::from_millis(cfg.base_delay_ms);
		let backoff = match cfg.backoff.as_str() {
			"exponential" => Backoff::Exponential { base, max: Duration::from_millis(cfg.max_delay_ms) },
			_ => Backoff::Linear { base, increment: Duration::from_millis(cfg.increment_ms) },
		};

		Self { max_attempts: cfg.max_attempts.max(1), backoff }
	}

	/// Delays before each retry the policy allows.
	pub fn schedule(&self) -> Vec<Duration> {
		(1..self.max_attempts).map(|retry| self.backoff.delay(retry)).collect()
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff: Backoff::Linear {
				base: Duration::from_secs(5),
				increment: Duration::from_secs(2),
			},
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	#[error("Network failure: {message}")]
	RetryableNetwork { message: String, attempt: u32 },
	#[error("Gateway failure: {message}")]
	RetryableGateway { message: String, attempt: u32 },
	#[error("Rate or complexity limit exceeded: {message}")]
	RateOrComplexityExceeded { message: String, attempt: u32 },
	#[error("Fatal response: {message}")]
	Fatal { message: String, attempt: u32 },
	#[error("Gave up after {attempts} attempts. {last}")]
	RetriesExhausted { attempts: u32, last: Box<TransportError> },
	#[error("Cancelled before the request completed.")]
	Cancelled,
}
impl TransportError {
	fn from_rejection(rejection: Rejection, attempt: u32) -> Self {
		let Rejection { kind, message } = rejection;

		match kind {
			FailureKind::RetryableNetwork => Self::RetryableNetwork { message, attempt },
			FailureKind::RetryableGateway => Self::RetryableGateway { message, attempt },
			FailureKind::RateOrComplexityExceeded =>
				Self::RateOrComplexityExceeded { message, attempt },
			FailureKind::Fatal | FailureKind::InvalidIdentifier | FailureKind::MalformedRecord =>
				Self::Fatal { message, attempt },
		}
	}

	/// `None` for [`TransportError::Cancelled`]. Exhaustion reports the last cause's kind.
	pub fn kind(&self) -> Option<FailureKind> {
		match self {
			Self::RetryableNetwork { .. } => Some(FailureKind::RetryableNetwork),
			Self::RetryableGateway { .. } => Some(FailureKind::RetryableGateway),
			Self::RateOrComplexityExceeded { .. } => Some(FailureKind::RateOrComplexityExceeded),
			Self::Fatal { .. } => Some(FailureKind::Fatal),
			Self::RetriesExhausted { last, .. } => last.kind(),
			Self::Cancelled => None,
		}
	}

	pub fn attempts(&self) -> u32 {
		match self {
			Self::RetryableNetwork { attempt, .. }
			| Self::RetryableGateway { attempt, .. }
			| Self::RateOrComplexityExceeded { attempt, .. }
			| Self::Fatal { attempt, .. } => *attempt,
			Self::RetriesExhausted { attempts, .. } => *attempts,
			Self::Cancelled => 0,
		}
	}

	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::RetryableNetwork { .. } | Self::RetryableGateway { .. })
	}

	pub fn to_cause(&self) -> Option<FailureCause> {
		let kind = self.kind()?;

		Some(FailureCause { kind, message: self.to_string(), attempts: self.attempts() })
	}
}

/// The rate budget shared by every request of a run.
#[derive(Clone, Debug, Default)]
pub struct SharedBudget(Arc<Mutex<RateBudget>>);
impl SharedBudget {
	pub fn absorb(&self, snapshot: Option<&RateLimitSnapshot>) {
		self.0.lock().unwrap_or_else(|err| err.into_inner()).absorb(snapshot);
	}

	pub fn snapshot(&self) -> RateBudget {
		self.0.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn pause_needed(&self, floor: u32, now: OffsetDateTime) -> Option<(u32, time::Duration)> {
		let budget = self.0.lock().unwrap_or_else(|err| err.into_inner());

		budget.pause_needed(floor, now).map(|pause| (budget.remaining.unwrap_or(0), pause))
	}
}

pub struct RateLimitedTransport {
	backend: Arc<dyn GraphqlBackend>,
	clock: Arc<dyn Clock>,
	policy: RetryPolicy,
	budget: SharedBudget,
	min_remaining: u32,
}
impl RateLimitedTransport {
	pub fn new(
		backend: Arc<dyn GraphqlBackend>,
		clock: Arc<dyn Clock>,
		policy: RetryPolicy,
		budget: SharedBudget,
		min_remaining: u32,
	) -> Self {
		Self { backend, clock, policy, budget, min_remaining }
	}

	pub fn budget(&self) -> &SharedBudget {
		&self.budget
	}

	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	pub fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	/// Sends `request`, retrying transient failures per the policy.
	pub async fn execute(
		&self,
		request: &GraphqlRequest,
		cancel: &CancellationToken,
	) -> Result<GraphqlResponse, TransportError> {
		let max_attempts = self.policy.max_attempts.max(1);
		let mut attempt = 0;

		loop {
			if cancel.is_cancelled() {
				return Err(TransportError::Cancelled);
			}

			self.wait_for_budget(cancel).await?;

			attempt += 1;

			let Attempt { outcome, rate_limit } = self.backend.send(request).await;

			self.budget.absorb(rate_limit.as_ref());

			let err = match outcome {
				Ok(response) => return Ok(response),
				Err(rejection) => TransportError::from_rejection(rejection, attempt),
			};

			if !err.is_retryable() {
				tracing::warn!(attempt, error = %err, "GraphQL request failed without retry.");

				return Err(err);
			}
			if attempt >= max_attempts {
				tracing::warn!(attempts = attempt, error = %err, "GraphQL request exhausted its retries.");

				return Err(TransportError::RetriesExhausted { attempts: attempt, last: Box::new(err) });
			}

			let delay = self.policy.backoff.delay(attempt);

			tracing::warn!(
				attempt,
				max_attempts,
				delay_ms = delay.as_millis() as u64,
				error = %err,
				"Retrying GraphQL request."
			);

			if !self.pause(delay, cancel).await {
				return Err(TransportError::Cancelled);
			}
		}
	}

	/// Suspends for `duration`. Returns `false` when cancelled first.
	pub async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
		if cancel.is_cancelled() {
			return false;
		}
		if duration.is_zero() {
			return true;
		}

		tokio::select! {
			biased;
			_ = cancel.cancelled() => false,
			_ = self.clock.sleep(duration) => true,
		}
	}

	async fn wait_for_budget(&self, cancel: &CancellationToken) -> Result<(), TransportError> {
		let Some((remaining, pause)) = self.budget.pause_needed(self.min_remaining, self.clock.now())
		else {
			return Ok(());
		};
		let pause = pause.unsigned_abs().min(MAX_BUDGET_PAUSE);

		tracing::info!(
			remaining,
			min_remaining = self.min_remaining,
			pause_secs = pause.as_secs(),
			"Rate budget below floor. Pausing until reset."
		);

		if self.pause(pause, cancel).await { Ok(()) } else { Err(TransportError::Cancelled) }
	}
}
