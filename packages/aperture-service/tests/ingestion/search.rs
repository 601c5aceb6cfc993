use aperture_domain::{Category, JobStatus, embedding_text, query_embedding_text};
use aperture_service::{Error, JobFilter, SearchRequest};
use aperture_storage::qdrant::VectorPoint;

use super::{FakeMail, Harness, message};

const MON: &str = "Mon, 6 Oct 2025 09:00:00 +0000";
const TUE: &str = "Tue, 7 Oct 2025 09:00:00 +0000";
const WED: &str = "Wed, 8 Oct 2025 09:00:00 +0000";

async fn indexed_mailbox() -> Harness {
	let harness = Harness::new(FakeMail::new(vec![
		message("m1", "Rust role", MON, "Systems work in Rust.", &[]),
		message("m2", "Backend role", TUE, "Services in Go and Rust.", &[]),
		message("m3", "Dinner plans", WED, "Pasta on Friday?", &[]),
	]));

	{
		let mut overrides = harness.embedding.overrides.lock().unwrap();

		overrides.insert(query_embedding_text("rust jobs"), vec![1.0, 0.0, 0.0, 0.0]);
		overrides.insert(
			embedding_text("Rust role", "Systems work in Rust."),
			vec![1.0, 0.0, 0.0, 0.0],
		);
		overrides.insert(
			embedding_text("Backend role", "Services in Go and Rust."),
			vec![1.0, 1.0, 0.0, 0.0],
		);
		overrides.insert(
			embedding_text("Dinner plans", "Pasta on Friday?"),
			vec![0.0, 0.0, 1.0, 0.0],
		);
	}

	harness.run().await;

	harness
}

#[tokio::test]
async fn results_are_ordered_by_relevance() {
	let harness = indexed_mailbox().await;
	let response = harness
		.service
		.search(SearchRequest { query: "  rust jobs ".to_string(), top_k: None })
		.await
		.expect("Search failed.");
	let ids: Vec<&str> = response.items.iter().map(|item| item.message_id.as_str()).collect();

	assert_eq!(ids, vec!["m1", "m2", "m3"]);
	assert!((response.items[0].relevance - 1.0).abs() < 1e-6);
	assert!((response.items[1].relevance - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
	assert!(response.items[2].relevance.abs() < 1e-6);
	assert!(response.items.windows(2).all(|pair| pair[0].relevance >= pair[1].relevance));
	assert_eq!(response.items[0].subject, "Rust role");
	assert_eq!(response.items[0].preview, "Systems work in Rust.");
	assert_eq!(response.items[0].category, Category::General);
}

#[tokio::test]
async fn top_k_bounds_the_result_count() {
	let harness = indexed_mailbox().await;
	let response = harness
		.service
		.search(SearchRequest { query: "rust jobs".to_string(), top_k: Some(2) })
		.await
		.expect("Search failed.");

	assert_eq!(response.items.len(), 2);
}

#[tokio::test]
async fn short_queries_are_rejected() {
	let harness = indexed_mailbox().await;
	let err = harness
		.service
		.search(SearchRequest { query: " a ".to_string(), top_k: None })
		.await
		.expect_err("Expected short query to be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn hits_without_a_stored_message_are_dropped() {
	let harness = indexed_mailbox().await;

	harness.vectors.points.lock().unwrap().insert(
		"ghost".to_string(),
		VectorPoint {
			message_id: "ghost".to_string(),
			vector: vec![1.0, 0.0, 0.0, 0.0],
			sender: "nobody@example.com".to_string(),
			subject: "Ghost".to_string(),
			has_attachment: false,
			embedding_version: "test:test:4".to_string(),
		},
	);

	let response = harness
		.service
		.search(SearchRequest { query: "rust jobs".to_string(), top_k: None })
		.await
		.expect("Search failed.");

	assert_eq!(response.items.len(), 3);
	assert!(response.items.iter().all(|item| item.message_id != "ghost"));
}

#[tokio::test]
async fn job_listing_filters_and_orders_newest_first() {
	let harness = Harness::new(FakeMail::new(vec![
		message("m1", "Your application", MON, "We received your application.", &[]),
		message("m2", "Your application", TUE, "Unfortunately we went another way.", &[]),
		message("m3", "Your receipt", WED, "Payment confirmation attached.", &[]),
	]));

	harness.run().await;

	let all = harness
		.service
		.list_job_applications(JobFilter::default())
		.await
		.expect("Listing failed.");
	let ids: Vec<&str> = all.iter().map(|item| item.message_id.as_str()).collect();

	assert_eq!(ids, vec!["m2", "m1"]);
	assert_eq!(all[0].status, Some(JobStatus::Rejected));
	assert_eq!(all[1].status, Some(JobStatus::Applied));

	let rejected = harness
		.service
		.list_job_applications(JobFilter {
			statuses: vec![JobStatus::Rejected],
			..Default::default()
		})
		.await
		.expect("Listing failed.");

	assert_eq!(rejected.len(), 1);
	assert_eq!(rejected[0].message_id, "m2");

	let receipts = harness
		.service
		.list_job_applications(JobFilter { categories: vec![Category::Receipt], statuses: vec![] })
		.await
		.expect("Listing failed.");

	assert_eq!(receipts.len(), 1);
	assert_eq!(receipts[0].message_id, "m3");
	assert_eq!(receipts[0].status, None);
}

#[tokio::test]
async fn query_and_index_share_the_embedding_text() {
	let harness = Harness::new(FakeMail::new(vec![
		message("m1", "Quarterly planning", MON, "", &[]),
		message("m2", "Dinner plans", TUE, "Pasta on Friday?", &[]),
	]));

	harness.run().await;

	let response = harness
		.service
		.search(SearchRequest { query: " Quarterly planning ".to_string(), top_k: Some(1) })
		.await
		.expect("Search failed.");

	assert_eq!(response.items.len(), 1);
	assert_eq!(response.items[0].message_id, "m1");
	assert!((response.items[0].relevance - 1.0).abs() < 1e-6);
	assert_eq!(
		harness.vectors.point("m1").map(|point| point.vector),
		Some(super::text_vector(&query_embedding_text("Quarterly planning")))
	);
}
