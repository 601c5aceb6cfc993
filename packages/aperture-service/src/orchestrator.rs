//! One ingestion run: list, dedupe, extract, classify, embed, and commit, oldest first.

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use aperture_domain::{extract::ExtractionIssue, raw::RawMessage};
use aperture_providers::credentials::AccessToken;
use aperture_storage::models::{NewAttachment, NewEmail};

use crate::{ApertureService, Deduplicator, DualStoreWriter, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
	Completed,
	NoCredential,
	FetchFailed,
	StoreUnavailable,
	Cancelled,
	DeadlineExceeded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
	pub run_id: Uuid,
	/// Listing pages read.
	pub pages: usize,
	/// Ids listed after the watermark.
	pub fetched: usize,
	pub batches: usize,
	/// Listed ids not reached because of the batch cap or an early stop.
	pub deferred: usize,
	pub skipped_duplicate: usize,
	pub skipped_error: usize,
	pub committed: usize,
	pub pending_embedding: usize,
	pub failed_batches: usize,
	pub outcome: RunOutcome,
}
impl RunSummary {
	fn new(run_id: Uuid) -> Self {
		Self {
			run_id,
			pages: 0,
			fetched: 0,
			batches: 0,
			deferred: 0,
			skipped_duplicate: 0,
			skipped_error: 0,
			committed: 0,
			pending_embedding: 0,
			failed_batches: 0,
			outcome: RunOutcome::Completed,
		}
	}
}

/// Why a page stopped before its last message.
enum Interrupt {
	Cancelled,
	Deadline,
}

struct RunContext<'a> {
	credential: &'a AccessToken,
	cancel: &'a CancellationToken,
	deadline: Option<Instant>,
}
impl RunContext<'_> {
	fn interrupt(&self) -> Option<Interrupt> {
		if self.cancel.is_cancelled() {
			return Some(Interrupt::Cancelled);
		}
		if let Some(deadline) = self.deadline
			&& Instant::now() >= deadline
		{
			return Some(Interrupt::Deadline);
		}

		None
	}
}

impl ApertureService {
	/// Runs one ingestion pass over everything listed after the watermark.
	///
	/// The listing is read in full, then processed oldest first in batches of `limit`, at most
	/// `ingestion.max_batches` batches per run. Every committed batch is older than any listed
	/// id left behind, so the watermark never passes a message that was listed but not stored.
	///
	/// Never returns an error: failures end the run early and are reported through
	/// [`RunSummary::outcome`]. Batches committed before a failure stay committed.
	pub async fn run_ingestion(&self, limit: u32, cancel: &CancellationToken) -> RunSummary {
		let mut summary = RunSummary::new(Uuid::new_v4());

		tracing::info!(run_id = %summary.run_id, limit, "Ingestion run started.");

		summary.outcome = self.ingest(limit, cancel, &mut summary).await;

		tracing::info!(
			run_id = %summary.run_id,
			outcome = ?summary.outcome,
			pages = summary.pages,
			fetched = summary.fetched,
			batches = summary.batches,
			deferred = summary.deferred,
			skipped_duplicate = summary.skipped_duplicate,
			skipped_error = summary.skipped_error,
			committed = summary.committed,
			pending_embedding = summary.pending_embedding,
			failed_batches = summary.failed_batches,
			"Ingestion run finished."
		);

		summary
	}

	async fn ingest(
		&self,
		limit: u32,
		cancel: &CancellationToken,
		summary: &mut RunSummary,
	) -> RunOutcome {
		let run_id = summary.run_id;
		let Some(credential) = self.providers.credentials.current_credential().await else {
			tracing::error!(%run_id, "Ingestion run aborted; no mail credential is available.");

			return RunOutcome::NoCredential;
		};
		let since = match self.latest_received_at().await {
			Ok(since) => since,
			Err(err) => {
				tracing::error!(
					%run_id,
					error = %err,
					"Ingestion run aborted; watermark lookup failed."
				);

				return RunOutcome::StoreUnavailable;
			},
		};
		let ctx = RunContext {
			credential: &credential,
			cancel,
			deadline: self
				.cfg
				.ingestion
				.run_deadline_ms
				.map(|ms| Instant::now() + std::time::Duration::from_millis(ms)),
		};
		let backlog = match self.list_backlog(&ctx, since, limit, summary).await {
			Ok(backlog) => backlog,
			Err(outcome) => return outcome,
		};

		if backlog.is_empty() {
			tracing::info!(%run_id, "No new messages found to ingest.");

			return RunOutcome::Completed;
		}

		let mut dedup = Deduplicator::new();
		let mut remaining = backlog.len();
		let mut outcome = RunOutcome::Completed;
		let max_batches = self.cfg.ingestion.max_batches.max(1) as usize;

		for chunk in backlog.chunks(limit.max(1) as usize).take(max_batches) {
			if let Some(interrupt) = ctx.interrupt() {
				outcome = interrupt_outcome(interrupt);

				break;
			}

			let mut batch = Vec::with_capacity(chunk.len());
			let mut stop = None;

			for message_id in chunk {
				if let Some(interrupt) = ctx.interrupt() {
					stop = Some(interrupt_outcome(interrupt));

					break;
				}

				remaining -= 1;

				match self.prepare_message(&ctx, &mut dedup, message_id, summary).await {
					Ok(Some(email)) => batch.push(email),
					Ok(None) => {},
					Err(err) => {
						tracing::error!(
							%run_id,
							message_id = %message_id,
							error = %err,
							"Fetching message failed; run aborted."
						);

						stop = Some(match err {
							Error::AuthUnavailable => RunOutcome::NoCredential,
							_ => RunOutcome::FetchFailed,
						});
						batch.clear();

						break;
					},
				}
			}

			summary.batches += 1;

			let batch_ok = self.commit(&batch, summary).await;

			if let Some(stop) = stop {
				outcome = stop;

				break;
			}
			if !batch_ok && !self.cfg.ingestion.continue_on_batch_failure {
				break;
			}
		}

		summary.deferred = remaining;

		if summary.deferred > 0 {
			tracing::info!(
				%run_id,
				deferred = summary.deferred,
				"Newer messages were left for a later run."
			);
		}

		outcome
	}

	/// Reads every listing page after `since` and returns the ids oldest first.
	///
	/// Nothing is processed until the listing is complete, so a listing failure or an
	/// interrupt here leaves both stores untouched.
	async fn list_backlog(
		&self,
		ctx: &RunContext<'_>,
		since: Option<OffsetDateTime>,
		limit: u32,
		summary: &mut RunSummary,
	) -> std::result::Result<Vec<String>, RunOutcome> {
		let run_id = summary.run_id;
		let mut ids = Vec::new();
		let mut page_token: Option<String> = None;

		loop {
			if let Some(interrupt) = ctx.interrupt() {
				return Err(interrupt_outcome(interrupt));
			}

			let page = match self
				.providers
				.mail
				.list_new_message_ids(ctx.credential, since, limit, page_token.as_deref())
				.await
			{
				Ok(page) => page,
				Err(aperture_providers::Error::Unauthorized { status }) => {
					tracing::error!(%run_id, status, "Mail credential was rejected; run aborted.");

					return Err(RunOutcome::NoCredential);
				},
				Err(err) => {
					tracing::error!(%run_id, error = %err, "Listing messages failed; run aborted.");

					return Err(RunOutcome::FetchFailed);
				},
			};

			summary.pages += 1;
			summary.fetched += page.ids.len();

			if page.ids.is_empty() {
				break;
			}

			ids.extend(page.ids);

			match page.next_page_token {
				Some(token) => page_token = Some(token),
				None => break,
			}
		}

		// Pages arrive newest first.
		ids.reverse();

		Ok(ids)
	}

	/// Takes one listed id through dedup, fetch, extraction, classification, and embedding.
	///
	/// `Ok(None)` means the message was skipped; `Err` is a fetch or credential failure that
	/// ends the run.
	async fn prepare_message(
		&self,
		ctx: &RunContext<'_>,
		dedup: &mut Deduplicator,
		message_id: &str,
		summary: &mut RunSummary,
	) -> Result<Option<NewEmail>> {
		match dedup.check(self.stores.messages.as_ref(), message_id).await {
			Ok(decision) if decision.is_new() => {},
			Ok(decision) => {
				tracing::debug!(message_id, ?decision, "Skipping already ingested message.");

				summary.skipped_duplicate += 1;

				return Ok(None);
			},
			Err(err) => {
				tracing::error!(
					message_id,
					error = %err,
					"Duplicate lookup failed; skipping message."
				);

				summary.skipped_error += 1;

				return Ok(None);
			},
		}

		let raw = self
			.providers
			.mail
			.get_message(ctx.credential, message_id)
			.await
			.map_err(|err| match err {
				aperture_providers::Error::Unauthorized { .. } => Error::AuthUnavailable,
				err => Error::FetchFailure { message: err.to_string() },
			})?;

		match self.build_email(&raw).await {
			Ok(email) => Ok(Some(email)),
			Err(err) => {
				tracing::error!(message_id, error = %err, "Embedding failed; skipping message.");

				summary.skipped_error += 1;

				Ok(None)
			},
		}
	}

	/// Extraction and classification never fail; only the embedding can.
	pub(crate) async fn build_email(&self, raw: &RawMessage) -> Result<NewEmail> {
		let content = self.extractor.extract(raw);

		for issue in &content.issues {
			log_extraction_issue(&raw.id, issue);
		}

		let classification = self
			.classifier
			.classify(
				self.providers.entities.as_ref(),
				&self.cfg.providers.entity_extractor,
				&content.subject,
				&content.body_text,
			)
			.await;
		let text = aperture_domain::embedding_text(&content.subject, &raw.snippet);
		let vec = self.embed_text(&text).await?;

		Ok(NewEmail {
			message_id: raw.id.clone(),
			thread_id: raw.thread_id.clone(),
			sender: content.sender,
			subject: content.subject,
			snippet: raw.snippet.clone(),
			received_at: content.received_at,
			category: classification.category().as_str().to_string(),
			job_company: classification.company().map(ToString::to_string),
			job_status: classification.job_status().map(|status| status.as_str().to_string()),
			embedding_version: crate::embedding_version(&self.cfg),
			attachments: content
				.attachments
				.into_iter()
				.map(|attachment| NewAttachment {
					filename: attachment.filename,
					mime_type: attachment.mime_type,
					size_bytes: attachment.size_bytes,
				})
				.collect(),
			vec,
		})
	}

	async fn commit(&self, batch: &[NewEmail], summary: &mut RunSummary) -> bool {
		if batch.is_empty() {
			return true;
		}

		let writer =
			DualStoreWriter::new(self.stores.messages.as_ref(), self.stores.vectors.as_ref());

		match writer.commit_batch(batch).await {
			Ok(outcome) => {
				summary.committed += outcome.committed;
				summary.pending_embedding += outcome.pending_embedding;

				tracing::info!(
					run_id = %summary.run_id,
					committed = outcome.committed,
					pending_embedding = outcome.pending_embedding,
					"Batch committed."
				);

				true
			},
			Err(_) => {
				summary.failed_batches += 1;

				false
			},
		}
	}
}

fn interrupt_outcome(interrupt: Interrupt) -> RunOutcome {
	match interrupt {
		Interrupt::Cancelled => RunOutcome::Cancelled,
		Interrupt::Deadline => RunOutcome::DeadlineExceeded,
	}
}

fn log_extraction_issue(message_id: &str, issue: &ExtractionIssue) {
	match issue {
		ExtractionIssue::BodyTruncated { original_chars } => {
			tracing::debug!(message_id, original_chars, "Message body truncated.");
		},
		issue => {
			tracing::warn!(message_id, ?issue, "Message extraction degraded.");
		},
	}
}
