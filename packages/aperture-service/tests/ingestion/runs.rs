use std::{sync::atomic::Ordering, time::Duration};

use time::macros::datetime;
use tokio_util::sync::CancellationToken;

use aperture_domain::{
	Category,
	entity::{Entity, EntityLabel},
	raw::RawMessage,
};
use aperture_service::RunOutcome;
use aperture_storage::models::{INGESTION_COMPLETE, OUTBOX_DONE};

use super::{FakeMail, Harness, message, test_config, token};

const MON: &str = "Mon, 6 Oct 2025 09:00:00 +0000";
const TUE: &str = "Tue, 7 Oct 2025 09:00:00 +0000";
const WED: &str = "Wed, 8 Oct 2025 09:00:00 +0000";
const THU: &str = "Thu, 9 Oct 2025 09:00:00 +0000";

fn application(id: &str, date: &str) -> RawMessage {
	message(
		id,
		"Your application to Acme Corp",
		date,
		"Hi Sam, we have received your application for the Backend Engineer role.",
		&[],
	)
}

#[tokio::test]
async fn fresh_application_is_indexed_with_status_and_company() {
	let harness = Harness::new(FakeMail::new(vec![application("m1", MON)]));

	*harness.entities.entities.lock().unwrap() = vec![
		Entity::new("LinkedIn", EntityLabel::Org),
		Entity::new("Acme Corp", EntityLabel::Org),
	];

	let summary = harness.run().await;

	assert_eq!(summary.outcome, RunOutcome::Completed);
	assert_eq!(summary.committed, 1);
	assert_eq!(summary.pending_embedding, 0);

	let row = harness.store.email("m1").expect("Expected stored message.");

	assert_eq!(row.category, "JobApplication");
	assert_eq!(row.job_status.as_deref(), Some("Applied"));
	assert_eq!(row.job_company.as_deref(), Some("Acme Corp"));
	assert_eq!(row.received_at, datetime!(2025-10-06 09:00 UTC));
	assert_eq!(row.ingestion_status, INGESTION_COMPLETE);
	assert!(!row.has_attachment);
	assert_eq!(harness.store.outbox("m1").expect("Expected outbox row.").status, OUTBOX_DONE);
	assert!(harness.vectors.point("m1").is_some());
}

#[tokio::test]
async fn rejection_wins_over_applied() {
	let raw = message(
		"m1",
		"Update on your application",
		MON,
		"Thank you for applying. Unfortunately, we have decided to pursue other candidates.",
		&[],
	);
	let harness = Harness::new(FakeMail::new(vec![raw]));

	harness.run().await;

	let row = harness.store.email("m1").expect("Expected stored message.");

	assert_eq!(row.category, "JobApplication");
	assert_eq!(row.job_status.as_deref(), Some("Rejected"));
}

#[tokio::test]
async fn attachments_are_stored_and_flagged_on_the_vector() {
	let raw = message(
		"m1",
		"Documents for your records",
		MON,
		"Please find the documents attached.",
		&[("resume.pdf", "application/pdf", 2_048), ("cover.pdf", "application/pdf", 1_024)],
	);
	let harness = Harness::new(FakeMail::new(vec![raw]));

	harness.run().await;

	let row = harness.store.email("m1").expect("Expected stored message.");

	assert!(row.has_attachment);
	assert_eq!(harness.store.attachments_of("m1"), vec!["resume.pdf", "cover.pdf"]);
	assert!(harness.vectors.point("m1").expect("Expected vector point.").has_attachment);
}

#[tokio::test]
async fn keywords_match_whole_words_only() {
	let receive = message("m1", "Please receive the package", MON, "Delivery tomorrow.", &[]);
	let cv = message("m2", "Attached my CV", TUE, "Looking forward to hearing back.", &[]);
	let harness = Harness::new(FakeMail::new(vec![receive, cv]));

	harness.run().await;

	assert_eq!(harness.store.email("m1").expect("Expected m1.").category, "General");
	assert_eq!(harness.store.email("m2").expect("Expected m2.").category, "JobApplication");
}

#[tokio::test]
async fn job_fields_are_set_only_for_job_applications() {
	let mailbox = vec![
		application("m1", MON),
		message("m2", "Your order has shipped", TUE, "Order confirmation inside.", &[]),
		message("m3", "Weekly notes", WED, "Click unsubscribe to stop.", &[]),
		message("m4", "Lunch?", WED, "Are you free on Friday?", &[]),
	];
	let harness = Harness::new(FakeMail::new(mailbox));

	*harness.entities.entities.lock().unwrap() = vec![Entity::new("Acme", EntityLabel::Org)];

	harness.run().await;

	let state = harness.store.state.lock().unwrap();

	assert_eq!(state.emails.len(), 4);

	for row in state.emails.values() {
		let is_job = row.category == Category::JobApplication.as_str();

		assert_eq!(row.job_status.is_some(), is_job, "{}", row.message_id);

		if !is_job {
			assert!(row.job_company.is_none(), "{}", row.message_id);
		}
	}

	assert_eq!(state.emails["m2"].category, "Receipt");
	assert_eq!(state.emails["m3"].category, "Newsletter");
	assert_eq!(state.emails["m4"].category, "General");
}

#[tokio::test]
async fn entity_failure_degrades_to_general() {
	let harness = Harness::new(FakeMail::new(vec![application("m1", MON)]));

	harness.entities.fail.store(true, Ordering::SeqCst);

	let summary = harness.run().await;
	let row = harness.store.email("m1").expect("Expected stored message.");

	assert_eq!(summary.committed, 1);
	assert_eq!(row.category, "General");
	assert!(row.job_status.is_none());
	assert!(row.job_company.is_none());
}

fn week() -> Vec<RawMessage> {
	vec![
		application("m1", MON),
		application("m2", TUE),
		application("m3", WED),
		application("m4", THU),
	]
}

#[tokio::test]
async fn rerun_skips_everything_already_stored() {
	let harness =
		Harness::new(FakeMail::new(vec![application("m1", MON), application("m2", TUE)]));
	let first = harness.run().await;

	harness.mail.ignore_since.store(true, Ordering::SeqCst);

	let second = harness.run().await;

	assert_eq!(first.committed, 2);
	assert_eq!(second.committed, 0);
	assert_eq!(second.skipped_duplicate, 2);
	assert_eq!(second.outcome, RunOutcome::Completed);
	assert_eq!(harness.store.email_count(), 2);
	assert_eq!(harness.vectors.count(), 2);
	assert_eq!(harness.vectors.upserts.load(Ordering::SeqCst), 1);
	assert_eq!(harness.mail.gets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn caught_up_mailbox_lists_nothing_new() {
	let harness = Harness::new(FakeMail::new(week()));

	harness.run().await;

	let second = harness.run().await;

	assert_eq!(second.outcome, RunOutcome::Completed);
	assert_eq!(second.fetched, 0);
	assert_eq!(second.committed, 0);
}

#[tokio::test]
async fn id_listed_twice_in_one_run_is_fetched_once() {
	let mailbox = vec![application("m1", MON), application("m2", TUE), application("m3", WED)];
	let harness = Harness::new(FakeMail::new(mailbox));

	harness.mail.relist_page_boundary.store(true, Ordering::SeqCst);

	let summary = harness.run_with_limit(2).await;

	assert_eq!(summary.pages, 2);
	assert_eq!(summary.fetched, 4);
	assert_eq!(summary.committed, 3);
	assert_eq!(summary.skipped_duplicate, 1);
	assert_eq!(harness.mail.gets.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn messages_are_processed_oldest_first_across_pages() {
	let harness = Harness::new(FakeMail::new(week()));
	let summary = harness.run_with_limit(3).await;

	assert_eq!(summary.pages, 2);
	assert_eq!(summary.batches, 2);
	assert_eq!(summary.committed, 4);
	assert_eq!(*harness.mail.fetched_ids.lock().unwrap(), vec!["m1", "m2", "m3", "m4"]);
}

#[tokio::test]
async fn watermark_is_the_newest_stored_message() {
	let harness = Harness::new(FakeMail::new(vec![application("m1", WED), application("m2", MON)]));

	harness.run().await;
	harness.run().await;

	let seen = harness.mail.seen_since.lock().unwrap().clone();

	assert_eq!(seen, vec![None, Some(datetime!(2025-10-08 09:00 UTC))]);
}

#[tokio::test]
async fn same_message_classifies_and_embeds_identically() {
	let first = Harness::new(FakeMail::new(vec![application("m1", MON)]));
	let second = Harness::new(FakeMail::new(vec![application("m1", MON)]));

	first.run().await;
	second.run().await;

	let a = first.store.email("m1").expect("Expected stored message.");
	let b = second.store.email("m1").expect("Expected stored message.");

	assert_eq!(a.category, b.category);
	assert_eq!(a.job_status, b.job_status);
	assert_eq!(a.job_company, b.job_company);
	assert_eq!(
		first.vectors.point("m1").map(|point| point.vector),
		second.vectors.point("m1").map(|point| point.vector),
	);
}

#[tokio::test]
async fn missing_credential_aborts_before_listing() {
	let harness = Harness::build(test_config(), FakeMail::new(vec![application("m1", MON)]), None);
	let summary = harness.run().await;

	assert_eq!(summary.outcome, RunOutcome::NoCredential);
	assert!(harness.mail.seen_since.lock().unwrap().is_empty());
	assert_eq!(harness.store.email_count(), 0);
}

#[tokio::test]
async fn rejected_credential_is_reported_as_missing() {
	let harness = Harness::new(FakeMail::new(vec![application("m1", MON)]));

	harness.mail.reject_credential.store(true, Ordering::SeqCst);

	let summary = harness.run().await;

	assert_eq!(summary.outcome, RunOutcome::NoCredential);
	assert_eq!(harness.store.email_count(), 0);
}

#[tokio::test]
async fn unreadable_watermark_aborts_the_run() {
	let harness = Harness::new(FakeMail::new(vec![application("m1", MON)]));

	harness.store.fail_reads.store(true, Ordering::SeqCst);

	let summary = harness.run().await;

	assert_eq!(summary.outcome, RunOutcome::StoreUnavailable);
	assert!(harness.mail.seen_since.lock().unwrap().is_empty());
}

#[tokio::test]
async fn listing_failure_commits_nothing() {
	let harness = Harness::new(FakeMail::new(vec![application("m1", MON)]));

	harness.mail.fail_listing.store(true, Ordering::SeqCst);

	let summary = harness.run().await;

	assert_eq!(summary.outcome, RunOutcome::FetchFailed);
	assert_eq!(summary.committed, 0);
	assert_eq!(harness.store.email_count(), 0);
	assert_eq!(harness.vectors.count(), 0);
}

#[tokio::test]
async fn fetch_failure_keeps_older_batches_and_later_runs_catch_up() {
	let harness = Harness::new(FakeMail::new(week()));

	harness.mail.failing_gets.lock().unwrap().insert("m3".to_string());

	let failed = harness.run_with_limit(2).await;

	assert_eq!(failed.outcome, RunOutcome::FetchFailed);
	assert_eq!(failed.committed, 2);
	assert_eq!(failed.deferred, 1);
	assert_eq!(harness.stored_ids(), vec!["m1", "m2"]);
	assert!(harness.vectors.point("m3").is_none());

	harness.mail.failing_gets.lock().unwrap().clear();

	let retry = harness.run_with_limit(2).await;

	assert_eq!(retry.outcome, RunOutcome::Completed);
	assert_eq!(retry.committed, 2);
	assert_eq!(harness.stored_ids(), vec!["m1", "m2", "m3", "m4"]);
}

#[tokio::test]
async fn fetch_failure_drops_the_unfinished_batch() {
	let harness = Harness::new(FakeMail::new(week()));

	harness.mail.failing_gets.lock().unwrap().insert("m2".to_string());

	let summary = harness.run_with_limit(2).await;

	assert_eq!(summary.outcome, RunOutcome::FetchFailed);
	assert_eq!(summary.committed, 0);
	assert_eq!(harness.store.email_count(), 0);
	assert_eq!(harness.vectors.count(), 0);
}

#[tokio::test]
async fn embedding_failure_skips_only_that_message() {
	let poisoned = message("m2", "POISON application", TUE, "Applied yesterday.", &[]);
	let harness =
		Harness::new(FakeMail::new(vec![application("m1", MON), poisoned, application("m3", WED)]));

	*harness.embedding.fail_marker.lock().unwrap() = Some("POISON".to_string());

	let summary = harness.run().await;

	assert_eq!(summary.outcome, RunOutcome::Completed);
	assert_eq!(summary.committed, 2);
	assert_eq!(summary.skipped_error, 1);
	assert!(harness.store.email("m2").is_none());
	assert!(harness.vectors.point("m2").is_none());
}

#[tokio::test]
async fn cancelled_run_commits_the_oldest_and_the_next_run_finishes() {
	let harness = Harness::new(FakeMail::new(week()));
	let cancel = CancellationToken::new();

	*harness.mail.cancel_after_gets.lock().unwrap() = Some((1, cancel.clone()));

	let cancelled = harness.service.run_ingestion(50, &cancel).await;

	assert_eq!(cancelled.outcome, RunOutcome::Cancelled);
	assert_eq!(cancelled.committed, 1);
	assert_eq!(cancelled.deferred, 3);
	assert_eq!(harness.stored_ids(), vec!["m1"]);

	*harness.mail.cancel_after_gets.lock().unwrap() = None;

	let resumed = harness.run().await;

	assert_eq!(resumed.outcome, RunOutcome::Completed);
	assert_eq!(resumed.fetched, 3);
	assert_eq!(resumed.committed, 3);
	assert_eq!(harness.stored_ids(), vec!["m1", "m2", "m3", "m4"]);
}

#[tokio::test]
async fn elapsed_deadline_stops_before_the_first_page() {
	let mut cfg = test_config();

	cfg.ingestion.run_deadline_ms = Some(0);

	let harness = Harness::build(cfg, FakeMail::new(vec![application("m1", MON)]), Some(token()));
	let summary = harness.run().await;

	assert_eq!(summary.outcome, RunOutcome::DeadlineExceeded);
	assert_eq!(summary.pages, 0);
	assert_eq!(harness.store.email_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_mid_run_keeps_older_messages_and_the_next_run_finishes() {
	let mut cfg = test_config();

	cfg.ingestion.run_deadline_ms = Some(250);

	let harness = Harness::build(cfg, FakeMail::new(week()), Some(token()));

	*harness.mail.get_latency.lock().unwrap() = Some(Duration::from_millis(200));

	let stopped = harness.run().await;

	assert_eq!(stopped.outcome, RunOutcome::DeadlineExceeded);
	assert_eq!(harness.stored_ids(), vec!["m1", "m2"]);

	*harness.mail.get_latency.lock().unwrap() = None;

	let resumed = harness.run().await;

	assert_eq!(resumed.outcome, RunOutcome::Completed);
	assert_eq!(harness.stored_ids(), vec!["m1", "m2", "m3", "m4"]);
}

#[tokio::test]
async fn batch_cap_defers_newer_messages_to_the_next_run() {
	let mut cfg = test_config();

	cfg.ingestion.max_batches = 1;

	let harness = Harness::build(cfg, FakeMail::new(week()), Some(token()));
	let first = harness.run_with_limit(2).await;

	assert_eq!(first.batches, 1);
	assert_eq!(first.committed, 2);
	assert_eq!(first.deferred, 2);
	assert_eq!(harness.stored_ids(), vec!["m1", "m2"]);

	let second = harness.run_with_limit(2).await;

	assert_eq!(second.fetched, 2);
	assert_eq!(second.deferred, 0);
	assert_eq!(harness.stored_ids(), vec!["m1", "m2", "m3", "m4"]);
}

#[tokio::test]
async fn failed_batch_stops_the_run_unless_configured_to_continue() {
	let mailbox = || vec![application("m1", MON), application("m2", TUE)];
	let stopping = Harness::new(FakeMail::new(mailbox()));

	stopping.store.fail_insert.store(true, Ordering::SeqCst);

	let summary = stopping.run_with_limit(1).await;

	assert_eq!(summary.batches, 1);
	assert_eq!(summary.failed_batches, 1);
	assert_eq!(summary.committed, 0);
	assert_eq!(summary.deferred, 1);

	let mut cfg = test_config();

	cfg.ingestion.continue_on_batch_failure = true;

	let continuing = Harness::build(cfg, FakeMail::new(mailbox()), Some(token()));

	continuing.store.fail_insert.store(true, Ordering::SeqCst);

	let summary = continuing.run_with_limit(1).await;

	assert_eq!(summary.batches, 2);
	assert_eq!(summary.failed_batches, 2);
}
