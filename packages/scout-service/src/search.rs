//! Cursor pagination over the user search endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use scout_domain::{
	Deduplicated, FailureCause, FailureKind, Identifier, Page, SEARCH_RESULT_CEILING,
	build_search_query, dedup_preserving_order,
};

use crate::{RateLimitedTransport, TransportError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchParams {
	pub filter: String,
	pub page_size: u32,
	pub max_pages: u32,
	pub inter_page_delay: Duration,
}
impl SearchParams {
	pub fn from_config(filter: String, cfg: &scout_config::Search) -> Self {
		Self {
			filter,
			page_size: cfg.page_size,
			max_pages: cfg.max_pages,
			inter_page_delay: Duration::from_millis(cfg.inter_page_delay_ms),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
	/// The backend reported no further pages.
	Exhausted,
	PageLimit,
	Cancelled,
	Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
	pub pages: u32,
	/// Match count reported by the backend, which may exceed what can be paged through.
	pub total_count: u64,
	pub retrieved: u64,
	pub unique: u64,
	pub duplicates_removed: u64,
	pub pages_for_full_coverage: u64,
	pub ceiling_hit: bool,
	pub stop_reason: StopReason,
	pub error: Option<FailureCause>,
}
impl SearchSummary {
	pub fn truncated(&self) -> bool {
		self.retrieved < self.total_count
	}

	/// The search ended on an error that makes enrichment pointless.
	pub fn failed_fatally(&self) -> bool {
		self.error.as_ref().is_some_and(|cause| cause.kind == FailureKind::Fatal)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOutcome {
	/// Unique identifiers in first-seen order.
	pub identifiers: Vec<Identifier>,
	pub summary: SearchSummary,
}

/// Pages through `params.filter` until the backend runs out of results, the page limit is
/// reached, a request fails, or `cancel` fires. Whatever was collected is always returned.
pub async fn search(
	transport: &RateLimitedTransport,
	params: &SearchParams,
	cancel: &CancellationToken,
) -> SearchOutcome {
	let mut raw = Vec::new();
	let mut cursor: Option<String> = None;
	let mut pages = 0_u32;
	let mut total_count = 0_u64;
	let mut error = None;
	let stop_reason = loop {
		if pages >= params.max_pages {
			break StopReason::PageLimit;
		}
		if pages > 0 && !transport.pause(params.inter_page_delay, cancel).await {
			break StopReason::Cancelled;
		}

		let request = build_search_query(&params.filter, params.page_size, cursor.as_deref());
		let response = match transport.execute(&request, cancel).await {
			Ok(response) => response,
			Err(TransportError::Cancelled) => break StopReason::Cancelled,
			Err(err) => {
				tracing::warn!(page = pages + 1, error = %err, "Search stopped on a failed page.");

				error = err.to_cause();

				break StopReason::Failed;
			},
		};
		let page = match Page::from_search_data(&response.data) {
			Ok(page) => page,
			Err(err) => {
				tracing::warn!(page = pages + 1, error = %err, "Search page could not be decoded.");

				error = Some(FailureCause {
					kind: FailureKind::MalformedRecord,
					message: format!("Search page is malformed: {err}."),
					attempts: 1,
				});

				break StopReason::Failed;
			},
		};

		pages += 1;
		total_count = page.total_count;

		tracing::info!(
			page = pages,
			found = page.identifiers.len(),
			total_count,
			has_more = page.has_more,
			"Fetched search page."
		);

		raw.extend(page.identifiers);

		match page.next_cursor {
			Some(next) if page.has_more => cursor = Some(next),
			_ => break StopReason::Exhausted,
		}
	};
	let retrieved = raw.len() as u64;
	let Deduplicated { identifiers, duplicates_removed } = dedup_preserving_order(raw);
	let ceiling_hit = total_count > SEARCH_RESULT_CEILING;

	if ceiling_hit {
		tracing::warn!(
			total_count,
			ceiling = SEARCH_RESULT_CEILING,
			"Search matches exceed the result ceiling. Narrow the filter to reach the rest."
		);
	}

	let summary = SearchSummary {
		pages,
		total_count,
		retrieved,
		unique: identifiers.len() as u64,
		duplicates_removed: duplicates_removed as u64,
		pages_for_full_coverage: total_count.div_ceil(u64::from(params.page_size.max(1))),
		ceiling_hit,
		stop_reason,
		error,
	};

	tracing::info!(
		pages = summary.pages,
		retrieved = summary.retrieved,
		unique = summary.unique,
		duplicates_removed = summary.duplicates_removed,
		truncated = summary.truncated(),
		stop_reason = ?summary.stop_reason,
		"Search finished."
	);

	SearchOutcome { identifiers, summary }
}
