use time::OffsetDateTime;

use aperture_storage::{models::NewEmail, qdrant::VectorPoint};

use crate::{
	Error, MessageStore, Result, VectorIndex,
	repair::{backoff_for_attempt, sanitize_outbox_error},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
	/// Messages now present in the relational store.
	pub committed: usize,
	/// Committed messages whose vector write has not landed yet.
	pub pending_embedding: usize,
}

/// Commits a batch to Postgres first, then to the vector index.
///
/// The relational transaction carries a pending-embedding marker per message, so a vector
/// failure after the commit leaves durable repair work instead of a silent gap.
pub struct DualStoreWriter<'a> {
	messages: &'a dyn MessageStore,
	vectors: &'a dyn VectorIndex,
}
impl<'a> DualStoreWriter<'a> {
	pub fn new(messages: &'a dyn MessageStore, vectors: &'a dyn VectorIndex) -> Self {
		Self { messages, vectors }
	}

	pub async fn commit_batch(&self, batch: &[NewEmail]) -> Result<BatchOutcome> {
		if batch.is_empty() {
			return Ok(BatchOutcome::default());
		}

		let now = OffsetDateTime::now_utc();

		if let Err(err) = self.messages.insert_batch(batch, now).await {
			tracing::error!(
				error = %err,
				batch_size = batch.len(),
				"Batch commit failed; rolled back without vector writes."
			);

			return Err(Error::StoreCommitFailure { message: err.to_string() });
		}

		let committed = batch.len();
		let ids: Vec<String> = batch.iter().map(|email| email.message_id.clone()).collect();
		let points: Vec<VectorPoint> = batch.iter().map(vector_point).collect();

		match self.vectors.upsert(&points).await {
			Ok(()) => {
				if let Err(err) = self.messages.mark_embedded(&ids, now).await {
					tracing::error!(
						error = %err,
						batch_size = committed,
						"Failed to mark batch as embedded; repair pass will re-upsert."
					);

					return Ok(BatchOutcome { committed, pending_embedding: committed });
				}

				Ok(BatchOutcome { committed, pending_embedding: 0 })
			},
			Err(err) => {
				let error_text = sanitize_outbox_error(&err.to_string());
				let available_at = now + backoff_for_attempt(1);

				tracing::error!(
					error = %error_text,
					batch_size = committed,
					"Vector upsert failed after commit; messages left pending for repair."
				);

				for message_id in &ids {
					if let Err(mark_err) = self
						.messages
						.mark_embedding_failed(message_id, &error_text, available_at, now)
						.await
					{
						tracing::error!(
							error = %mark_err,
							message_id = %message_id,
							"Failed to record vector write failure."
						);
					}
				}

				Ok(BatchOutcome { committed, pending_embedding: committed })
			},
		}
	}
}

pub(crate) fn vector_point(email: &NewEmail) -> VectorPoint {
	VectorPoint {
		message_id: email.message_id.clone(),
		vector: email.vec.clone(),
		sender: email.sender.clone(),
		subject: email.subject.clone(),
		has_attachment: !email.attachments.is_empty(),
		embedding_version: email.embedding_version.clone(),
	}
}
