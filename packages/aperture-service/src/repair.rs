use serde::Serialize;
use time::{Duration, OffsetDateTime};

use aperture_storage::{models::PendingEmbedding, qdrant::VectorPoint};

use crate::{ApertureService, Result, validate_vector_dim};

const CLAIM_LEASE_SECONDS: i64 = 30;
const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const MAX_OUTBOX_ERROR_CHARS: usize = 1_024;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
	pub claimed: usize,
	pub repaired: usize,
	pub failed: usize,
}

impl ApertureService {
	/// Retries vector writes for messages still marked pending embedding.
	pub async fn repair_pending_embeddings(&self) -> Result<RepairReport> {
		self.repair_pending_embeddings_at(OffsetDateTime::now_utc()).await
	}

	pub async fn repair_pending_embeddings_at(&self, now: OffsetDateTime) -> Result<RepairReport> {
		let cfg = &self.cfg.repair;
		let rows = self
			.stores
			.messages
			.claim_pending(
				now,
				cfg.batch_size as i64,
				cfg.max_attempts,
				Duration::seconds(CLAIM_LEASE_SECONDS),
			)
			.await?;
		let mut report = RepairReport { claimed: rows.len(), ..Default::default() };

		if rows.is_empty() {
			return Ok(report);
		}

		let mut points = Vec::with_capacity(rows.len());
		let mut ready = Vec::with_capacity(rows.len());

		for row in rows {
			match self.repair_vector(&row, now).await {
				Ok(vector) => {
					points.push(VectorPoint {
						message_id: row.message_id.clone(),
						vector,
						sender: row.sender.clone(),
						subject: row.subject.clone(),
						has_attachment: row.has_attachment,
						embedding_version: row.embedding_version.clone(),
					});
					ready.push(row);
				},
				Err(err) => {
					self.record_repair_failure(&row, &err.to_string(), now).await;

					report.failed += 1;
				},
			}
		}

		if ready.is_empty() {
			return Ok(report);
		}

		match self.stores.vectors.upsert(&points).await {
			Ok(()) => {
				let ids: Vec<String> = ready.iter().map(|row| row.message_id.clone()).collect();

				self.stores.messages.mark_embedded(&ids, now).await?;

				report.repaired += ready.len();
			},
			Err(err) => {
				let message = err.to_string();

				for row in &ready {
					self.record_repair_failure(row, &message, now).await;
				}

				report.failed += ready.len();
			},
		}

		tracing::info!(
			claimed = report.claimed,
			repaired = report.repaired,
			failed = report.failed,
			"Embedding repair pass finished."
		);

		Ok(report)
	}

	/// Uses the staged vector when it fits the collection; otherwise re-embeds the stored text.
	async fn repair_vector(&self, row: &PendingEmbedding, now: OffsetDateTime) -> Result<Vec<f32>> {
		let vector_dim = self.cfg.storage.qdrant.vector_dim;

		if let Some(vec) = row.vec.as_ref()
			&& validate_vector_dim(vec, vector_dim).is_ok()
		{
			return Ok(vec.clone());
		}

		let text = aperture_domain::embedding_text(&row.subject, &row.snippet);
		let vec = self.embed_text(&text).await?;

		self.stores.messages.store_vector(&row.message_id, &vec, now).await?;

		Ok(vec)
	}

	async fn record_repair_failure(
		&self,
		row: &PendingEmbedding,
		error: &str,
		now: OffsetDateTime,
	) {
		let next_attempts = row.attempts.saturating_add(1);
		let available_at = now + backoff_for_attempt(next_attempts);
		let error_text = sanitize_outbox_error(error);

		tracing::error!(
			error = %error_text,
			message_id = %row.message_id,
			attempts = next_attempts,
			"Embedding repair failed."
		);

		if let Err(err) = self
			.stores
			.messages
			.mark_embedding_failed(&row.message_id, &error_text, available_at, now)
			.await
		{
			tracing::error!(
				error = %err,
				message_id = %row.message_id,
				"Failed to record embedding repair failure."
			);
		}
	}
}

pub(crate) fn backoff_for_attempt(attempt: i32) -> Duration {
	let attempts = attempt.max(1) as u32;
	let exp = attempts.saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);
	let capped = base.min(MAX_BACKOFF_MS);

	Duration::milliseconds(capped)
}

/// Redacts credentials from provider error text before it is persisted.
pub(crate) fn sanitize_outbox_error(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "access_token", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = raw.split(sep).next().unwrap_or(raw);

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_OUTBOX_ERROR_CHARS {
		out = out.chars().take(MAX_OUTBOX_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}
