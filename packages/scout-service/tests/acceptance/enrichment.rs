use std::time::Duration;

use time::macros::date;
use tokio_util::sync::CancellationToken;

use scout_domain::{BatchShape, FailureKind, Identifier, TimeWindow};
use scout_providers::graphql::{Attempt, GraphqlError};
use scout_service::{EnrichParams, enrich};

use crate::acceptance::{ManualClock, ScriptedBackend, batch_reply, gateway, logins, transport};

fn params(batch_size: usize) -> EnrichParams {
	EnrichParams {
		batch_size,
		window: TimeWindow { from: date!(2024 - 10 - 19), to: date!(2025 - 10 - 19) },
		shape: BatchShape { repositories_per_identifier: 5, exclude_forks: true },
		inter_batch_delay: Duration::from_millis(500),
	}
}

fn ids(raw: &[&str]) -> Vec<Identifier> {
	raw.iter().map(|value| Identifier::from(*value)).collect()
}

fn record_ids(outcome: &scout_service::EnrichOutcome) -> Vec<&str> {
	outcome.records.iter().map(|record| record.identifier.as_str()).collect()
}

#[tokio::test]
async fn batches_partition_the_input_in_order() {
	let backend = ScriptedBackend::new(|_, request| batch_reply(request, &[]));
	let clock = ManualClock::new();
	let transport = transport(backend.clone(), clock.clone(), 0);
	let input = ids(&["a", "b", "c", "d", "e", "f", "g"]);
	let outcome = enrich::enrich(&transport, input, &params(3), &CancellationToken::new()).await;

	assert_eq!(backend.batches(), vec![vec!["a", "b", "c"], vec!["d", "e", "f"], vec!["g"]]);
	assert_eq!(record_ids(&outcome), vec!["a", "b", "c", "d", "e", "f", "g"]);
	assert_eq!(outcome.batches_sent, 3);
	assert!(outcome.failed_batches.is_empty());
	assert_eq!(clock.sleeps(), vec![Duration::from_millis(500); 2]);
}

#[tokio::test]
async fn exhausted_middle_batch_is_contained() {
	let backend = ScriptedBackend::new(|_, request| {
		if logins(request).contains(&"c".to_string()) { gateway() } else { batch_reply(request, &[]) }
	});
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let input = ids(&["a", "b", "c", "d", "e", "f"]);
	let outcome = enrich::enrich(&transport, input, &params(2), &CancellationToken::new()).await;

	assert_eq!(record_ids(&outcome), vec!["a", "b", "e", "f"]);
	assert_eq!(outcome.failed_batches.len(), 1);

	let failure = &outcome.failed_batches[0];

	assert_eq!(failure.batch.ordinal, 2);
	assert_eq!(outcome.failed_identifiers().map(Identifier::as_str).collect::<Vec<_>>(), vec!["c", "d"]);
	assert_eq!(failure.cause.kind, FailureKind::RetryableGateway);
	assert_eq!(failure.cause.attempts, 3);
	assert!(!outcome.aborted);
	// 1 + 3 + 1 requests.
	assert_eq!(backend.calls(), 5);
}

#[tokio::test]
async fn null_members_are_not_found_rather_than_failed() {
	let backend = ScriptedBackend::new(|_, request| batch_reply(request, &["ghost"]));
	let transport = transport(backend, ManualClock::new(), 0);
	let input = ids(&["a", "ghost", "b"]);
	let outcome = enrich::enrich(&transport, input, &params(15), &CancellationToken::new()).await;

	assert_eq!(record_ids(&outcome), vec!["a", "b"]);
	assert_eq!(outcome.not_found, ids(&["ghost"]));
	assert!(outcome.failed_batches.is_empty());
}

#[tokio::test]
async fn member_error_other_than_not_found_fails_that_member() {
	let backend = ScriptedBackend::new(|_, request| {
		let Attempt { outcome, rate_limit } = batch_reply(request, &["b", "ghost"]);
		let mut response = outcome.expect("Scripted success.");

		response.errors = vec![
			GraphqlError {
				message: "Could not resolve to a User with the login of 'ghost'.".to_string(),
				kind: Some("NOT_FOUND".to_string()),
				path: vec![serde_json::json!("u2")],
			},
			GraphqlError {
				message: "Something went wrong while executing your query. This may be the result of a timeout.".to_string(),
				kind: None,
				path: vec![serde_json::json!("u1")],
			},
		];

		Attempt { outcome: Ok(response), rate_limit }
	});
	let transport = transport(backend, ManualClock::new(), 0);
	let outcome = enrich::enrich(
		&transport,
		ids(&["a", "b", "ghost"]),
		&params(15),
		&CancellationToken::new(),
	)
	.await;

	assert_eq!(record_ids(&outcome), vec!["a"]);
	assert_eq!(outcome.not_found, ids(&["ghost"]));
	assert_eq!(outcome.failed_identifiers().map(Identifier::as_str).collect::<Vec<_>>(), vec!["b"]);

	let cause = &outcome.failed_batches[0].cause;

	assert_eq!(cause.kind, FailureKind::RetryableGateway);
	assert!(cause.kind.is_recoverable());
	assert!(cause.message.contains("timeout"));
}

#[tokio::test]
async fn undecodable_member_fails_alone() {
	let backend = ScriptedBackend::new(|_, request| {
		let Attempt { outcome, rate_limit } = batch_reply(request, &[]);
		let mut response = outcome.expect("Scripted success.");

		response.data["u1"] = serde_json::json!({ "login": "b" });

		Attempt { outcome: Ok(response), rate_limit }
	});
	let transport = transport(backend, ManualClock::new(), 0);
	let outcome =
		enrich::enrich(&transport, ids(&["a", "b", "c"]), &params(15), &CancellationToken::new()).await;

	assert_eq!(record_ids(&outcome), vec!["a", "c"]);
	assert_eq!(outcome.failed_batches.len(), 1);
	assert_eq!(outcome.failed_batches[0].cause.kind, FailureKind::MalformedRecord);
	assert_eq!(outcome.failed_batches[0].batch.members[0].identifier.as_str(), "b");
}

#[tokio::test]
async fn fatal_failure_aborts_and_reports_the_rest_unattempted() {
	let backend = ScriptedBackend::new(|index, request| match index {
		0 => batch_reply(request, &[]),
		_ => Attempt::rejected(FailureKind::Fatal, "HTTP 401: Bad credentials"),
	});
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let input = ids(&["a", "b", "c", "d", "e"]);
	let outcome = enrich::enrich(&transport, input, &params(2), &CancellationToken::new()).await;

	assert!(outcome.aborted);
	assert_eq!(record_ids(&outcome), vec!["a", "b"]);
	assert_eq!(outcome.failed_batches.len(), 1);
	assert_eq!(outcome.failed_batches[0].cause.kind, FailureKind::Fatal);
	assert_eq!(outcome.unattempted, ids(&["e"]));
	assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn invalid_and_duplicate_identifiers_never_reach_the_backend() {
	let backend = ScriptedBackend::new(|_, request| batch_reply(request, &[]));
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let input = ids(&["a", "-bad", "a", "b"]);
	let outcome = enrich::enrich(&transport, input, &params(15), &CancellationToken::new()).await;

	assert_eq!(backend.batches(), vec![vec!["a", "b"]]);
	assert_eq!(outcome.duplicates_removed, 1);
	assert_eq!(outcome.rejected.len(), 1);
	assert_eq!(outcome.rejected[0].identifier.as_str(), "-bad");
}

#[tokio::test]
async fn cancellation_leaves_remaining_identifiers_unattempted() {
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();
	let backend = ScriptedBackend::new(move |_, request| {
		trigger.cancel();

		batch_reply(request, &[])
	});
	let transport = transport(backend.clone(), ManualClock::new(), 0);
	let input = ids(&["a", "b", "c", "d", "e"]);
	let outcome = enrich::enrich(&transport, input, &params(2), &cancel).await;

	assert!(outcome.cancelled);
	assert_eq!(record_ids(&outcome), vec!["a", "b"]);
	assert_eq!(outcome.unattempted, ids(&["c", "d", "e"]));
	assert_eq!(backend.calls(), 1);
}
