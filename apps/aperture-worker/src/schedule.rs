//! Interval loop: one ingestion run, then one repair pass, until Ctrl-C.

use std::{sync::Arc, time::Duration};

use tokio::time::{self, MissedTickBehavior};

use aperture_service::{ApertureService, Error, IngestionHandle, Result, RunSummary};

pub struct Scheduler {
	service: Arc<ApertureService>,
	handle: IngestionHandle,
	limit: u32,
	interval: Duration,
}
impl Scheduler {
	pub fn new(
		service: Arc<ApertureService>,
		handle: IngestionHandle,
		limit: u32,
		interval: Duration,
	) -> Self {
		Self { service, handle, limit, interval }
	}

	/// Submits one run, waits for it, then retries pending vector writes.
	///
	/// A failed repair pass is logged and does not fail the tick.
	pub async fn tick(&self) -> Result<RunSummary> {
		let summary = self.handle.submit(self.limit)?.wait().await?;

		match self.service.repair_pending_embeddings().await {
			Ok(report) if report.claimed > 0 => {
				tracing::info!(
					claimed = report.claimed,
					repaired = report.repaired,
					failed = report.failed,
					"Repair pass after ingestion run finished."
				);
			},
			Ok(_) => {},
			Err(err) => tracing::error!(error = %err, "Embedding repair pass failed."),
		}

		Ok(summary)
	}

	/// Ticks every `interval` until Ctrl-C. The in-flight run is cancelled cooperatively.
	pub async fn run_until_shutdown(&self) {
		let mut ticker = time::interval(self.interval);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		let shutdown = tokio::signal::ctrl_c();

		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				result = &mut shutdown => {
					if let Err(err) = result {
						tracing::error!(error = %err, "Failed to listen for the shutdown signal.");
					}

					tracing::info!("Shutdown requested; cancelling ingestion.");
					self.handle.shutdown();

					break;
				},
				result = async {
					ticker.tick().await;

					self.tick().await
				} => match result {
					Ok(_) => {},
					Err(Error::WorkerStopped) => {
						tracing::error!("Ingestion worker stopped unexpectedly.");

						break;
					},
					Err(err) => tracing::error!(error = %err, "Scheduled ingestion run failed."),
				},
			}
		}
	}
}
