//! Batched enrichment of identifiers through aliased GraphQL requests.

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use scout_domain::{
	Batch, BatchShape, CandidateRecord, Deduplicated, FailureCause, FailureKind, FailureRecord,
	Identifier, RejectedIdentifier, TimeWindow, batch_count, build_batch_query,
	dedup_preserving_order,
};
use scout_providers::graphql::GraphqlResponse;

use crate::{RateLimitedTransport, TransportError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichParams {
	pub batch_size: usize,
	pub window: TimeWindow,
	pub shape: BatchShape,
	pub inter_batch_delay: Duration,
}
impl EnrichParams {
	pub fn from_config(cfg: &scout_config::Enrich, window: TimeWindow, batch_size: u32) -> Self {
		Self {
			batch_size: batch_size.max(1) as usize,
			window,
			shape: BatchShape {
				repositories_per_identifier: cfg.repositories_per_identifier,
				exclude_forks: cfg.exclude_forks,
			},
			inter_batch_delay: Duration::from_millis(cfg.inter_batch_delay_ms),
		}
	}
}

/// Every input identifier lands in exactly one of `records`, `not_found`, `failed_batches`,
/// `rejected` or `unattempted`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnrichOutcome {
	pub records: Vec<CandidateRecord>,
	/// Identifiers the backend resolved to nothing.
	pub not_found: Vec<Identifier>,
	pub failed_batches: Vec<FailureRecord>,
	pub rejected: Vec<RejectedIdentifier>,
	pub unattempted: Vec<Identifier>,
	pub duplicates_removed: usize,
	pub batches_sent: usize,
	/// A fatal failure stopped the pass early.
	pub aborted: bool,
	pub cancelled: bool,
}
impl EnrichOutcome {
	pub fn failed_identifiers(&self) -> impl Iterator<Item = &Identifier> {
		self.failed_batches.iter().flat_map(|failure| failure.batch.identifiers())
	}
}

pub async fn enrich(
	transport: &RateLimitedTransport,
	identifiers: Vec<Identifier>,
	params: &EnrichParams,
	cancel: &CancellationToken,
) -> EnrichOutcome {
	let Deduplicated { identifiers, duplicates_removed } = dedup_preserving_order(identifiers);
	let batch_size = params.batch_size.max(1);
	let batches = batch_count(identifiers.len(), batch_size);
	let mut outcome = EnrichOutcome { duplicates_removed, ..Default::default() };
	let mut chunks = identifiers.chunks(batch_size).enumerate();

	tracing::info!(identifiers = identifiers.len(), batches, batch_size, "Starting enrichment pass.");

	for (index, chunk) in chunks.by_ref() {
		if index > 0 && !transport.pause(params.inter_batch_delay, cancel).await {
			outcome.cancelled = true;
			outcome.unattempted.extend(chunk.iter().cloned());

			break;
		}

		let query = match build_batch_query(index + 1, chunk, &params.window, params.shape) {
			Ok(query) => query,
			Err(err) => {
				tracing::error!(batch = index + 1, error = %err, "Activity window could not be formatted.");

				outcome.aborted = true;
				outcome.unattempted.extend(chunk.iter().cloned());

				break;
			},
		};

		for rejected in &query.rejected {
			tracing::warn!(
				identifier = %rejected.identifier,
				reason = rejected.reason.describe(),
				"Identifier rejected before enrichment."
			);
		}

		outcome.rejected.extend(query.rejected);

		let batch = query.batch;

		if batch.is_empty() {
			continue;
		}

		outcome.batches_sent += 1;

		match transport.execute(&query.request, cancel).await {
			Ok(response) => {
				let before = outcome.records.len();

				absorb_batch(&mut outcome, batch, &response);

				tracing::info!(
					batch = index + 1,
					batches,
					records = outcome.records.len() - before,
					"Enriched batch."
				);
			},
			Err(TransportError::Cancelled) => {
				outcome.cancelled = true;
				outcome.unattempted.extend(batch.identifiers().cloned());

				break;
			},
			Err(err) => {
				let cause = err.to_cause().unwrap_or_else(|| FailureCause {
					kind: FailureKind::Fatal,
					message: err.to_string(),
					attempts: err.attempts(),
				});
				let fatal = cause.kind == FailureKind::Fatal;

				outcome.failed_batches.push(FailureRecord { batch, cause, retry_count: 0 });

				if fatal {
					tracing::error!(batch = index + 1, error = %err, "Enrichment aborted on a fatal failure.");

					outcome.aborted = true;

					break;
				}

				tracing::warn!(batch = index + 1, error = %err, "Batch failed.");
			},
		}
	}

	outcome.unattempted.extend(chunks.flat_map(|(_, chunk)| chunk.iter().cloned()));

	outcome
}

fn absorb_batch(outcome: &mut EnrichOutcome, batch: Batch, response: &GraphqlResponse) {
	let ordinal = batch.ordinal;

	for member in batch.members {
		let node = match response.data.get(&member.alias) {
			None | Some(Value::Null) => {
				if let Some(rejection) = response.alias_failure(&member.alias) {
					tracing::warn!(
						identifier = %member.identifier,
						error = %rejection.message,
						"Identifier failed inside its batch."
					);

					outcome.failed_batches.push(FailureRecord {
						batch: Batch { ordinal, members: vec![member] },
						cause: FailureCause {
							kind: rejection.kind,
							message: rejection.message,
							attempts: 1,
						},
						retry_count: 0,
					});
				} else {
					tracing::debug!(identifier = %member.identifier, "Identifier resolved to no user.");

					outcome.not_found.push(member.identifier);
				}

				continue;
			},
			Some(node) => node,
		};

		match CandidateRecord::decode(member.identifier.clone(), node) {
			Ok(record) => outcome.records.push(record),
			Err(err) => {
				tracing::warn!(identifier = %member.identifier, error = %err, "Record could not be decoded.");

				outcome.failed_batches.push(FailureRecord {
					batch: Batch { ordinal, members: vec![member] },
					cause: FailureCause {
						kind: FailureKind::MalformedRecord,
						message: format!("Record is malformed: {err}."),
						attempts: 1,
					},
					retry_count: 0,
				});
			},
		}
	}
}
