//! The full pipeline: search, enrich, recover, report.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use scout_config::Config;
use scout_domain::{
	CandidateRecord, FailureRecord, Identifier, PermanentFailure, RateBudget, TimeWindow,
	build_location_filter,
};

use crate::{
	Clock, EnrichParams, Error, GraphqlBackend, HttpBackend, RateLimitedTransport, Result,
	RetryPolicy, SearchParams, SearchSummary, SharedBudget, TokioClock, enrich, recovery, search,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarvestReport {
	pub run_id: Uuid,
	#[serde(with = "scout_domain::time_serde")]
	pub started_at: OffsetDateTime,
	#[serde(with = "scout_domain::time_serde")]
	pub finished_at: OffsetDateTime,
	pub filter: String,
	pub window: TimeWindow,
	pub search: SearchSummary,
	pub records: Vec<CandidateRecord>,
	pub not_found: Vec<Identifier>,
	pub failures: Vec<PermanentFailure>,
	pub unattempted: Vec<Identifier>,
	pub recovery_attempted: bool,
	pub budget: RateBudget,
	pub cancelled: bool,
}

pub struct Harvester {
	cfg: Config,
	transport: RateLimitedTransport,
}
impl Harvester {
	pub fn new(cfg: Config) -> Result<Self> {
		let backend = Arc::new(HttpBackend::new(&cfg.provider)?);

		Ok(Self::with_backend(cfg, backend, Arc::new(TokioClock)))
	}

	pub fn with_backend(
		cfg: Config,
		backend: Arc<dyn GraphqlBackend>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let transport = RateLimitedTransport::new(
			backend,
			clock,
			RetryPolicy::from_config(&cfg.retry),
			SharedBudget::default(),
			cfg.budget.min_remaining,
		);

		Self { cfg, transport }
	}

	/// Logs the effective settings. The API key is never included.
	pub fn log_summary(&self, filter: &str) {
		let cfg = &self.cfg;
		let schedule = self
			.transport
			.policy()
			.schedule()
			.iter()
			.map(|delay| format!("{}ms", delay.as_millis()))
			.collect::<Vec<_>>()
			.join(", ");

		tracing::info!(
			api = %format!("{}{}", cfg.provider.api_base, cfg.provider.path),
			filter,
			page_size = cfg.search.page_size,
			max_pages = cfg.search.max_pages,
			batch_size = cfg.enrich.batch_size,
			recovery_enabled = cfg.enrich.recovery_enabled,
			recovery_batch_size = cfg.enrich.recovery_batch_size,
			activity_window_days = cfg.enrich.activity_window_days,
			repositories_per_identifier = cfg.enrich.repositories_per_identifier,
			exclude_forks = cfg.enrich.exclude_forks,
			max_attempts = cfg.retry.max_attempts,
			backoff = %cfg.retry.backoff,
			retry_delays = %schedule,
			min_remaining = cfg.budget.min_remaining,
			"Harvest configuration."
		);
	}

	pub async fn run(&self, cancel: &CancellationToken) -> Result<HarvestReport> {
		let run_id = Uuid::new_v4();
		let started_at = self.transport.now();
		let filter = resolve_filter(&self.cfg.search)?;
		let window = TimeWindow::trailing_days(started_at, self.cfg.enrich.activity_window_days);

		self.log_summary(&filter);

		tracing::info!(%run_id, from = %window.from, to = %window.to, "Starting harvest.");

		let searched = search::search(
			&self.transport,
			&SearchParams::from_config(filter.clone(), &self.cfg.search),
			cancel,
		)
		.await;
		let mut records = Vec::new();
		let mut not_found = Vec::new();
		let mut failures = Vec::new();
		let mut unattempted = Vec::new();
		let mut recovery_attempted = false;

		if searched.summary.failed_fatally() {
			tracing::error!(%run_id, "Search failed fatally. Skipping enrichment.");

			unattempted.extend(searched.identifiers);
		} else {
			let params = EnrichParams::from_config(
				&self.cfg.enrich,
				window,
				self.cfg.enrich.batch_size,
			);
			let pass = enrich::enrich(&self.transport, searched.identifiers, &params, cancel).await;
			let mut failed: Vec<FailureRecord> = pass.failed_batches;

			records.extend(pass.records);
			not_found.extend(pass.not_found);
			unattempted.extend(pass.unattempted);
			failures.extend(pass.rejected.into_iter().map(|rejected| rejected.into_permanent()));

			if self.cfg.enrich.recovery_enabled
				&& !failed.is_empty()
				&& !pass.aborted
				&& !cancel.is_cancelled()
			{
				let params = EnrichParams {
					batch_size: self.cfg.enrich.recovery_batch_size.max(1) as usize,
					..params
				};
				let recovered = recovery::recover(&self.transport, failed, &params, cancel).await;

				recovery_attempted = recovered.pool > 0;
				records.extend(recovered.recovered);
				not_found.extend(recovered.not_found);
				unattempted.extend(recovered.unattempted);
				failures
					.extend(recovered.rejected.into_iter().map(|rejected| rejected.into_permanent()));

				failed = recovered.still_failed;
			}

			failures.extend(failed.into_iter().flat_map(FailureRecord::into_permanent));
		}

		let report = HarvestReport {
			run_id,
			started_at,
			finished_at: self.transport.now(),
			filter,
			window,
			search: searched.summary,
			records,
			not_found,
			failures,
			unattempted,
			recovery_attempted,
			budget: self.transport.budget().snapshot(),
			cancelled: cancel.is_cancelled(),
		};

		tracing::info!(
			%run_id,
			records = report.records.len(),
			not_found = report.not_found.len(),
			failures = report.failures.len(),
			unattempted = report.unattempted.len(),
			cancelled = report.cancelled,
			"Harvest finished."
		);

		Ok(report)
	}
}

/// The explicit filter wins; otherwise the configured locations are OR-joined.
pub fn resolve_filter(cfg: &scout_config::Search) -> Result<String> {
	if let Some(filter) = cfg.filter.as_deref().map(str::trim).filter(|filter| !filter.is_empty()) {
		return Ok(filter.to_string());
	}

	let filter = build_location_filter(&cfg.locations);

	if filter.is_empty() {
		return Err(Error::InvalidRequest {
			message: "search.filter or search.locations must be set.".to_string(),
		});
	}

	Ok(filter)
}
