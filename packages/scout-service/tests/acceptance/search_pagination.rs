use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use scout_domain::{FailureKind, Identifier};
use scout_providers::graphql::Attempt;
use scout_service::{SearchParams, StopReason, search};

use crate::acceptance::{ManualClock, ScriptedBackend, search_page, transport};

fn params(page_size: u32, max_pages: u32) -> SearchParams {
	SearchParams {
		filter: "location:X".to_string(),
		page_size,
		max_pages,
		inter_page_delay: Duration::from_secs(1),
	}
}

fn ids(raw: &[&str]) -> Vec<Identifier> {
	raw.iter().map(|value| Identifier::from(*value)).collect()
}

#[tokio::test]
async fn duplicates_across_pages_are_removed_in_first_seen_order() {
	let backend = ScriptedBackend::new(|index, _| match index {
		0 => search_page(&["u1", "u2"], Some("c1"), true, 3),
		_ => search_page(&["u2", "u3"], Some("c2"), false, 3),
	});
	let clock = ManualClock::new();
	let transport = transport(backend.clone(), clock.clone(), 0);
	let outcome = search::search(&transport, &params(2, 2), &CancellationToken::new()).await;

	assert_eq!(outcome.identifiers, ids(&["u1", "u2", "u3"]));
	assert_eq!(outcome.summary.duplicates_removed, 1);
	assert_eq!(outcome.summary.retrieved, 4);
	assert_eq!(outcome.summary.pages, 2);
	assert_eq!(outcome.summary.stop_reason, StopReason::Exhausted);
	assert_eq!(backend.search_cursors(), vec![Value::Null, Value::from("c1")]);
	assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn stops_at_page_limit_and_reports_coverage() {
	let backend = ScriptedBackend::new(|index, _| {
		let login = format!("u{index}");

		search_page(&[login.as_str()], Some("next"), true, 2_500)
	});
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let outcome = search::search(&transport, &params(1, 3), &CancellationToken::new()).await;

	assert_eq!(backend.calls(), 3);
	assert_eq!(outcome.summary.stop_reason, StopReason::PageLimit);
	assert!(outcome.summary.truncated());
	assert!(outcome.summary.ceiling_hit);
	assert_eq!(outcome.summary.pages_for_full_coverage, 2_500);
	assert_eq!(outcome.summary.total_count, 2_500);
}

#[tokio::test]
async fn failed_page_keeps_collected_identifiers() {
	let backend = ScriptedBackend::new(|index, _| match index {
		0 => search_page(&["u1", "u2"], Some("c1"), true, 10),
		_ => Attempt::rejected(FailureKind::RateOrComplexityExceeded, "Resource limits exceeded."),
	});
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let outcome = search::search(&transport, &params(2, 5), &CancellationToken::new()).await;

	assert_eq!(outcome.identifiers, ids(&["u1", "u2"]));
	assert_eq!(outcome.summary.stop_reason, StopReason::Failed);
	assert_eq!(
		outcome.summary.error.as_ref().map(|cause| cause.kind),
		Some(FailureKind::RateOrComplexityExceeded)
	);
	assert!(!outcome.summary.failed_fatally());
	assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn cancellation_between_pages_returns_what_was_collected() {
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();
	let backend = ScriptedBackend::new(move |_, _| {
		trigger.cancel();

		search_page(&["u1"], Some("c1"), true, 50)
	});
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let outcome = search::search(&transport, &params(1, 10), &cancel).await;

	assert_eq!(outcome.identifiers, ids(&["u1"]));
	assert_eq!(outcome.summary.stop_reason, StopReason::Cancelled);
	assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn organisations_without_login_are_skipped() {
	let backend = ScriptedBackend::new(|_, _| {
		Attempt::success(serde_json::json!({
			"search": {
				"userCount": 2,
				"pageInfo": { "endCursor": null, "hasNextPage": false },
				"nodes": [ { "login": "u1" }, {} ]
			}
		}))
	});
	let transport = transport(backend, ManualClock::new(), 0);
	let outcome = search::search(&transport, &params(10, 1), &CancellationToken::new()).await;

	assert_eq!(outcome.identifiers, ids(&["u1"]));
	assert_eq!(outcome.summary.stop_reason, StopReason::Exhausted);
}
