use std::time::Duration;

use tokio_util::sync::CancellationToken;

use scout_domain::{FailureKind, Identifier};
use scout_providers::graphql::Attempt;
use scout_service::{Harvester, StopReason};
use scout_testkit::{GraphqlStub, StubResponse, fixtures};

use crate::acceptance::{
	ManualClock, ScriptedBackend, batch_reply, gateway, search_page, test_config,
};

fn ids(raw: &[&str]) -> Vec<Identifier> {
	raw.iter().map(|value| Identifier::from(*value)).collect()
}

fn record_ids(report: &scout_service::HarvestReport) -> Vec<&str> {
	report.records.iter().map(|record| record.identifier.as_str()).collect()
}

#[tokio::test]
async fn search_dedup_retry_and_enrich_end_to_end() {
	let backend = ScriptedBackend::new(|index, request| match index {
		0 => search_page(&["u1", "u2"], Some("c1"), true, 3),
		1 => search_page(&["u2", "u3"], None, false, 3),
		2 => gateway(),
		_ => batch_reply(request, &[]),
	});
	let clock = ManualClock::new();
	let harvester = Harvester::with_backend(test_config("loc:X"), backend.clone(), clock.clone());
	let report = harvester.run(&CancellationToken::new()).await.expect("Harvest failed.");

	assert_eq!(report.filter, "loc:X");
	assert_eq!(report.search.unique, 3);
	assert_eq!(report.search.duplicates_removed, 1);
	assert_eq!(report.search.stop_reason, StopReason::Exhausted);
	assert_eq!(backend.batches(), vec![vec!["u1", "u2"], vec!["u1", "u2"], vec!["u3"]]);
	assert_eq!(record_ids(&report), vec!["u1", "u2", "u3"]);
	assert!(report.failures.is_empty());
	assert!(report.not_found.is_empty());
	assert!(report.unattempted.is_empty());
	assert!(!report.recovery_attempted);
	assert!(!report.cancelled);
	assert_eq!(report.budget.attempts, 5);
	assert_eq!(
		clock.sleeps(),
		vec![Duration::from_secs(1), Duration::from_secs(5), Duration::from_millis(500)]
	);
}

#[tokio::test]
async fn fatal_search_skips_enrichment() {
	let backend = ScriptedBackend::new(|index, _| match index {
		0 => search_page(&["u1", "u2"], Some("c1"), true, 9),
		_ => Attempt::rejected(FailureKind::Fatal, "HTTP 401: Bad credentials"),
	});
	let harvester = Harvester::with_backend(test_config("loc:X"), backend.clone(), ManualClock::new());
	let report = harvester.run(&CancellationToken::new()).await.expect("Harvest failed.");

	assert!(report.search.failed_fatally());
	assert_eq!(report.unattempted, ids(&["u1", "u2"]));
	assert!(report.records.is_empty());
	assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn complexity_failure_is_recovered_at_smaller_batches() {
	let backend = ScriptedBackend::new(|index, request| match index {
		0 => search_page(&["u1", "u2", "ghost"], None, false, 3),
		1 => Attempt::rejected(FailureKind::RateOrComplexityExceeded, "Resource limits exceeded."),
		_ => batch_reply(request, &["ghost"]),
	});
	let harvester = Harvester::with_backend(test_config("loc:X"), backend.clone(), ManualClock::new());
	let report = harvester.run(&CancellationToken::new()).await.expect("Harvest failed.");

	assert!(report.recovery_attempted);
	assert_eq!(
		backend.batches(),
		vec![vec!["u1", "u2"], vec!["ghost"], vec!["u1"], vec!["u2"]]
	);
	assert_eq!(record_ids(&report), vec!["u1", "u2"]);
	assert_eq!(report.not_found, ids(&["ghost"]));
	assert!(report.failures.is_empty());
}

#[tokio::test]
async fn exhausted_batch_without_recovery_is_reported_per_identifier() {
	let backend = ScriptedBackend::new(|index, request| match index {
		0 => search_page(&["u1", "u2", "u3"], None, false, 3),
		1..=3 => gateway(),
		_ => batch_reply(request, &[]),
	});
	let mut cfg = test_config("loc:X");

	cfg.enrich.recovery_enabled = false;

	let harvester = Harvester::with_backend(cfg, backend, ManualClock::new());
	let report = harvester.run(&CancellationToken::new()).await.expect("Harvest failed.");

	assert_eq!(record_ids(&report), vec!["u3"]);
	assert_eq!(report.failures.len(), 2);
	assert_eq!(report.failures[0].identifier.as_str(), "u1");
	assert_eq!(report.failures[0].kind, FailureKind::RetryableGateway);
	assert_eq!(report.failures[0].attempts, 3);
	assert_eq!(report.failures[1].retry_count, 0);
}

#[tokio::test]
async fn harvests_through_http_backend() {
	let stub = GraphqlStub::start(vec![
		StubResponse::json(fixtures::search_body(&["u1", "ghost"], None, false, 2)),
		StubResponse::json(fixtures::batch_body(&[("u0", Some("u1")), ("u1", None)])),
	])
	.await
	.expect("Failed to start stub.");
	let mut cfg = test_config("location:prague");

	cfg.provider.api_base = stub.api_base().to_string();
	cfg.search.inter_page_delay_ms = 0;
	cfg.enrich.inter_batch_delay_ms = 0;

	let harvester = Harvester::new(cfg).expect("Failed to build harvester.");
	let report = harvester.run(&CancellationToken::new()).await.expect("Harvest failed.");

	assert_eq!(record_ids(&report), vec!["u1"]);
	assert_eq!(report.records[0].repositories[0].primary_language.as_deref(), Some("Rust"));
	assert_eq!(report.not_found, ids(&["ghost"]));
	assert_eq!(report.budget.remaining, Some(4_800));
	assert_eq!(stub.request_count(), 2);

	let json = serde_json::to_value(&report).expect("Failed to serialize report.");

	assert_eq!(json["search"]["stop_reason"], "exhausted");
	assert_eq!(json["not_found"][0], "ghost");

	let requests = stub.requests();

	assert_eq!(requests[1]["variables"]["l0"], "u1");
	assert_eq!(requests[1]["variables"]["l1"], "ghost");
}

#[tokio::test]
async fn cancelled_run_accounts_for_every_identifier() {
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();
	let backend = ScriptedBackend::new(move |index, request| match index {
		0 => search_page(&["u1", "u2", "u3", "u4"], None, false, 4),
		_ => {
			trigger.cancel();

			batch_reply(request, &[])
		},
	});
	let harvester = Harvester::with_backend(test_config("loc:X"), backend, ManualClock::new());
	let report = harvester.run(&cancel).await.expect("Harvest failed.");

	assert!(report.cancelled);
	assert_eq!(record_ids(&report), vec!["u1", "u2"]);
	assert_eq!(report.unattempted, ids(&["u3", "u4"]));
}
