use std::time::Duration;

use tokio_util::sync::CancellationToken;

use scout_domain::{FailureKind, RateLimitSnapshot, build_search_query};
use scout_providers::graphql::Attempt;
use scout_service::TransportError;

use crate::acceptance::{ManualClock, ScriptedBackend, search_page, transport};

#[tokio::test]
async fn network_failures_exhaust_after_three_attempts() {
	let backend = ScriptedBackend::new(|_, _| {
		Attempt::rejected(FailureKind::RetryableNetwork, "connection reset")
	});
	let clock = ManualClock::new();
	let transport = transport(backend.clone(), clock.clone(), 0);
	let err = transport
		.execute(&build_search_query("location:x", 10, None), &CancellationToken::new())
		.await
		.expect_err("Expected exhaustion.");

	assert!(matches!(err, TransportError::RetriesExhausted { attempts: 3, .. }));
	assert_eq!(err.kind(), Some(FailureKind::RetryableNetwork));
	assert_eq!(backend.calls(), 3);
	assert_eq!(clock.sleeps(), vec![Duration::from_secs(5), Duration::from_secs(7)]);
	assert_eq!(transport.budget().snapshot().attempts, 3);
}

#[tokio::test]
async fn transient_failure_then_success_returns_data() {
	let backend = ScriptedBackend::new(|index, _| match index {
		0 => Attempt::rejected(FailureKind::RetryableGateway, "HTTP 504."),
		_ => search_page(&["u1"], None, false, 1),
	});
	let clock = ManualClock::new();
	let transport = transport(backend.clone(), clock.clone(), 0);
	let response = transport
		.execute(&build_search_query("location:x", 10, None), &CancellationToken::new())
		.await
		.expect("Expected success after one retry.");

	assert_eq!(response.data["search"]["nodes"][0]["login"], "u1");
	assert_eq!(backend.calls(), 2);
	assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
}

#[tokio::test]
async fn limit_and_fatal_failures_are_never_retried() {
	for kind in [FailureKind::RateOrComplexityExceeded, FailureKind::Fatal] {
		let backend = ScriptedBackend::new(move |_, _| Attempt::rejected(kind, "refused"));
		let clock = ManualClock::new();
		let transport = transport(backend.clone(), clock.clone(), 0);
		let err = transport
			.execute(&build_search_query("location:x", 10, None), &CancellationToken::new())
			.await
			.expect_err("Expected failure.");

		assert_eq!(err.kind(), Some(kind));
		assert_eq!(err.attempts(), 1);
		assert_eq!(backend.calls(), 1, "kind={kind}");
		assert!(clock.sleeps().is_empty());
	}
}

#[tokio::test]
async fn budget_absorbs_figures_from_failed_attempts() {
	let backend = ScriptedBackend::new(|_, _| {
		Attempt::rejected(FailureKind::Fatal, "HTTP 401.").with_rate_limit(RateLimitSnapshot {
			remaining: Some(4_321),
			limit: Some(5_000),
			..Default::default()
		})
	});
	let transport = transport(backend, ManualClock::new(), 0);
	let _ = transport
		.execute(&build_search_query("location:x", 10, None), &CancellationToken::new())
		.await;
	let budget = transport.budget().snapshot();

	assert_eq!(budget.remaining, Some(4_321));
	assert_eq!(budget.attempts, 1);
}

#[tokio::test]
async fn low_budget_pauses_until_reset() {
	let backend = ScriptedBackend::new(|_, _| {
		Attempt::success(serde_json::json!({
			"rateLimit": { "cost": 1, "remaining": 10, "limit": 5_000, "resetAt": "2025-10-19T15:00:00Z" },
			"search": { "userCount": 0, "pageInfo": { "endCursor": null, "hasNextPage": false }, "nodes": [] }
		}))
	});
	let clock = ManualClock::new();
	let transport = transport(backend.clone(), clock.clone(), 100);
	let cancel = CancellationToken::new();
	let request = build_search_query("location:x", 10, None);

	transport.execute(&request, &cancel).await.expect("First request failed.");

	assert!(clock.sleeps().is_empty());

	transport.execute(&request, &cancel).await.expect("Second request failed.");

	assert_eq!(clock.sleeps(), vec![Duration::from_secs(300)]);
	assert_eq!(backend.calls(), 2);
	assert_eq!(transport.budget().snapshot().total_cost, 2);
}

#[tokio::test]
async fn cancelled_token_sends_nothing() {
	let backend = ScriptedBackend::new(|index, _| search_page(&["u1"], None, false, index as u64));
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let cancel = CancellationToken::new();

	cancel.cancel();

	let err = transport
		.execute(&build_search_query("location:x", 10, None), &cancel)
		.await
		.expect_err("Expected cancellation.");

	assert_eq!(err, TransportError::Cancelled);
	assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn cancellation_during_backoff_stops_retrying() {
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();
	let backend = ScriptedBackend::new(move |_, _| {
		trigger.cancel();

		Attempt::rejected(FailureKind::RetryableNetwork, "timed out")
	});
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let err = transport
		.execute(&build_search_query("location:x", 10, None), &cancel)
		.await
		.expect_err("Expected cancellation.");

	assert_eq!(err, TransportError::Cancelled);
	assert_eq!(backend.calls(), 1);
}
