//! A single second pass over failed batches at a smaller batch size.

use tokio_util::sync::CancellationToken;

use scout_domain::{CandidateRecord, FailureRecord, Identifier, RejectedIdentifier};

use crate::{EnrichParams, RateLimitedTransport, enrich};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecoveryOutcome {
	pub recovered: Vec<CandidateRecord>,
	pub not_found: Vec<Identifier>,
	/// Failures that were not retried plus those that failed again.
	pub still_failed: Vec<FailureRecord>,
	pub rejected: Vec<RejectedIdentifier>,
	pub unattempted: Vec<Identifier>,
	/// Identifiers re-submitted in this pass.
	pub pool: usize,
	pub aborted: bool,
	pub cancelled: bool,
}

/// Re-enriches the identifiers of recoverable failures once with `params.batch_size`.
/// Non-recoverable failures pass through untouched; failures of this pass carry
/// `retry_count + 1`.
pub async fn recover(
	transport: &RateLimitedTransport,
	failed: Vec<FailureRecord>,
	params: &EnrichParams,
	cancel: &CancellationToken,
) -> RecoveryOutcome {
	let (recoverable, permanent): (Vec<_>, Vec<_>) =
		failed.into_iter().partition(|failure| failure.cause.kind.is_recoverable());
	let retry_count =
		recoverable.iter().map(|failure| failure.retry_count).max().unwrap_or(0) + 1;
	let pool: Vec<Identifier> =
		recoverable.iter().flat_map(|failure| failure.batch.identifiers().cloned()).collect();
	let mut outcome =
		RecoveryOutcome { still_failed: permanent, pool: pool.len(), ..Default::default() };

	if pool.is_empty() {
		return outcome;
	}

	tracing::info!(
		identifiers = pool.len(),
		failed_batches = recoverable.len(),
		batch_size = params.batch_size,
		"Recovering failed identifiers."
	);

	let pass = enrich::enrich(transport, pool, params, cancel).await;

	outcome.recovered = pass.records;
	outcome.not_found = pass.not_found;
	outcome.rejected = pass.rejected;
	outcome.unattempted = pass.unattempted;
	outcome.aborted = pass.aborted;
	outcome.cancelled = pass.cancelled;
	outcome.still_failed.extend(pass.failed_batches.into_iter().map(|mut failure| {
		failure.retry_count = retry_count;

		failure
	}));

	tracing::info!(
		recovered = outcome.recovered.len(),
		still_failed = outcome.still_failed.len(),
		"Recovery pass finished."
	);

	outcome
}
