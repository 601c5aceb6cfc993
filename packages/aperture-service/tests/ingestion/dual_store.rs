use std::sync::atomic::Ordering;

use time::{Duration, OffsetDateTime, macros::datetime};

use aperture_service::{DualStoreWriter, Error, MessageStore, RepairReport};
use aperture_storage::models::{
	INGESTION_COMPLETE, INGESTION_PENDING_EMBEDDING, NewAttachment, NewEmail, OUTBOX_DONE,
	OUTBOX_FAILED,
};

use super::{FakeMail, Harness, VECTOR_DIM, message, text_vector};

const MON: &str = "Mon, 6 Oct 2025 09:00:00 +0000";
const TUE: &str = "Tue, 7 Oct 2025 09:00:00 +0000";
const WED: &str = "Wed, 8 Oct 2025 09:00:00 +0000";

fn staged_email(id: &str) -> NewEmail {
	NewEmail {
		message_id: id.to_string(),
		thread_id: format!("thread-{id}"),
		sender: "billing@example.com".to_string(),
		subject: "Your receipt".to_string(),
		snippet: "Thanks for your purchase.".to_string(),
		received_at: datetime!(2025-10-06 09:00 UTC),
		category: "Receipt".to_string(),
		job_company: None,
		job_status: None,
		embedding_version: "test:test:4".to_string(),
		attachments: vec![NewAttachment {
			filename: "receipt.pdf".to_string(),
			mime_type: "application/pdf".to_string(),
			size_bytes: 512,
		}],
		vec: vec![0.5; VECTOR_DIM],
	}
}

fn two_messages() -> FakeMail {
	FakeMail::new(vec![
		message("m1", "Your receipt", MON, "Thanks for your purchase.", &[]),
		message("m2", "Your order", TUE, "Order confirmation.", &[]),
	])
}

#[tokio::test]
async fn failed_commit_leaves_both_stores_empty() {
	let harness = Harness::new(FakeMail::new(vec![
		message("m1", "Your receipt", MON, "Thanks for your purchase.", &[]),
		message("m2", "Your order", TUE, "Order confirmation.", &[]),
		message("m3", "Invoice", WED, "October invoice.", &[("invoice.pdf", "application/pdf", 9)]),
	]));

	harness.store.fail_insert.store(true, Ordering::SeqCst);

	let summary = harness.run().await;

	assert_eq!(summary.batches, 1);
	assert_eq!(summary.failed_batches, 1);
	assert_eq!(summary.committed, 0);
	assert_eq!(harness.mail.gets.load(Ordering::SeqCst), 3);
	assert_eq!(harness.store.email_count(), 0);
	assert!(harness.store.state.lock().unwrap().attachments.is_empty());
	assert!(harness.store.outbox("m1").is_none());
	assert!(harness.store.outbox("m3").is_none());
	assert_eq!(harness.vectors.count(), 0);
	assert_eq!(harness.vectors.upserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicate_in_batch_rolls_back_everything() {
	let harness = Harness::new(FakeMail::default());
	let writer = DualStoreWriter::new(harness.store.as_ref(), harness.vectors.as_ref());
	let err = writer
		.commit_batch(&[staged_email("m1"), staged_email("m2"), staged_email("m1")])
		.await
		.expect_err("Expected duplicate batch to fail.");

	assert!(matches!(err, Error::StoreCommitFailure { .. }));
	assert_eq!(harness.store.email_count(), 0);
	assert_eq!(harness.vectors.count(), 0);
}

#[tokio::test]
async fn vector_failure_leaves_messages_pending_until_repaired() {
	let harness = Harness::new(two_messages());

	harness.vectors.fail_upsert.store(true, Ordering::SeqCst);

	let summary = harness.run().await;

	assert_eq!(summary.committed, 2);
	assert_eq!(summary.pending_embedding, 2);
	assert_eq!(harness.vectors.count(), 0);

	let row = harness.store.email("m1").expect("Expected stored message.");
	let outbox = harness.store.outbox("m1").expect("Expected outbox row.");
	let last_error = outbox.last_error.expect("Expected recorded error.");

	assert_eq!(row.ingestion_status, INGESTION_PENDING_EMBEDDING);
	assert_eq!(outbox.status, OUTBOX_FAILED);
	assert_eq!(outbox.attempts, 1);
	assert!(last_error.contains("api_key=[REDACTED]"));
	assert!(!last_error.contains("sk-live-1"));

	harness.vectors.fail_upsert.store(false, Ordering::SeqCst);

	let embeds_before = harness.embedding.calls.load(Ordering::SeqCst);
	let later = OffsetDateTime::now_utc() + Duration::minutes(1);
	let report = harness
		.service
		.repair_pending_embeddings_at(later)
		.await
		.expect("Repair pass failed.");

	assert_eq!(report, RepairReport { claimed: 2, repaired: 2, failed: 0 });
	assert_eq!(harness.embedding.calls.load(Ordering::SeqCst), embeds_before);
	assert_eq!(harness.vectors.count(), 2);
	assert_eq!(
		harness.store.email("m1").expect("Expected stored message.").ingestion_status,
		INGESTION_COMPLETE
	);
	assert_eq!(harness.store.outbox("m2").expect("Expected outbox row.").status, OUTBOX_DONE);
	assert_eq!(
		harness.vectors.point("m1").expect("Expected vector point.").vector,
		text_vector(&aperture_domain::embedding_text("Your receipt", "Thanks for your purchase."))
	);
}

#[tokio::test]
async fn staged_rows_are_left_alone_while_the_writer_holds_them() {
	let harness = Harness::new(FakeMail::default());
	let now = OffsetDateTime::now_utc();

	harness.store.insert_batch(&[staged_email("m1")], now).await.expect("Insert failed.");

	let early =
		harness.service.repair_pending_embeddings_at(now).await.expect("Repair pass failed.");

	assert_eq!(early.claimed, 0);

	let late = harness
		.service
		.repair_pending_embeddings_at(now + Duration::minutes(2))
		.await
		.expect("Repair pass failed.");

	assert_eq!(late, RepairReport { claimed: 1, repaired: 1, failed: 0 });
	assert!(harness.vectors.point("m1").expect("Expected vector point.").has_attachment);
}

#[tokio::test]
async fn repair_re_embeds_when_the_staged_vector_is_unusable() {
	let harness = Harness::new(FakeMail::default());
	let now = OffsetDateTime::now_utc();

	harness.store.insert_batch(&[staged_email("m1")], now).await.expect("Insert failed.");

	if let Some(entry) = harness.store.state.lock().unwrap().outbox.get_mut("m1") {
		entry.vec = Some(vec![1.0]);
	}

	let report = harness
		.service
		.repair_pending_embeddings_at(now + Duration::minutes(2))
		.await
		.expect("Repair pass failed.");
	let expected =
		text_vector(&aperture_domain::embedding_text("Your receipt", "Thanks for your purchase."));

	assert_eq!(report.repaired, 1);
	assert_eq!(harness.embedding.calls.load(Ordering::SeqCst), 1);
	assert_eq!(harness.store.outbox("m1").and_then(|entry| entry.vec), Some(expected.clone()));
	assert_eq!(harness.vectors.point("m1").map(|point| point.vector), Some(expected));
}

#[tokio::test]
async fn failed_repair_backs_off_and_respects_the_attempt_cap() {
	let harness = Harness::new(FakeMail::default());
	let now = OffsetDateTime::now_utc();

	harness.store.insert_batch(&[staged_email("m1")], now).await.expect("Insert failed.");
	harness.vectors.fail_upsert.store(true, Ordering::SeqCst);

	let at = now + Duration::minutes(2);
	let report = harness.service.repair_pending_embeddings_at(at).await.expect("Repair failed.");
	let outbox = harness.store.outbox("m1").expect("Expected outbox row.");

	assert_eq!(report, RepairReport { claimed: 1, repaired: 0, failed: 1 });
	assert_eq!(outbox.attempts, 1);
	assert_eq!(outbox.available_at, at + Duration::milliseconds(500));

	let retry = harness.service.repair_pending_embeddings_at(at).await.expect("Repair failed.");

	assert_eq!(retry.claimed, 0);

	if let Some(entry) = harness.store.state.lock().unwrap().outbox.get_mut("m1") {
		entry.attempts = harness.service.cfg.repair.max_attempts;
	}

	let capped = harness
		.service
		.repair_pending_embeddings_at(at + Duration::hours(1))
		.await
		.expect("Repair failed.");

	assert_eq!(capped.claimed, 0);
	assert_eq!(
		harness.store.email("m1").expect("Expected row.").ingestion_status,
		INGESTION_PENDING_EMBEDDING
	);
}
