//! Background execution of ingestion runs.
//!
//! Runs are submitted to a bounded queue and executed one at a time by a single task, so two
//! runs never share the stores. Submitting returns immediately; the ticket reports completion.

use std::sync::Arc;

use tokio::{
	sync::{mpsc, oneshot},
	task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{ApertureService, Error, Result, RunSummary};

const QUEUE_CAPACITY: usize = 8;

struct RunRequest {
	limit: u32,
	cancel: CancellationToken,
	reply: oneshot::Sender<RunSummary>,
}

pub struct IngestionWorker;
impl IngestionWorker {
	pub fn spawn(service: Arc<ApertureService>) -> (IngestionHandle, JoinHandle<()>) {
		let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
		let shutdown = CancellationToken::new();
		let task = tokio::spawn(run_queue(service, rx, shutdown.clone()));

		(IngestionHandle { tx, shutdown }, task)
	}
}

#[derive(Clone)]
pub struct IngestionHandle {
	tx: mpsc::Sender<RunRequest>,
	shutdown: CancellationToken,
}
impl IngestionHandle {
	/// Queues one ingestion run with batch limit `limit`.
	pub fn submit(&self, limit: u32) -> Result<RunTicket> {
		let cancel = self.shutdown.child_token();
		let (reply, rx) = oneshot::channel();
		let request = RunRequest { limit, cancel: cancel.clone(), reply };

		self.tx.try_send(request).map_err(|err| match err {
			mpsc::error::TrySendError::Full(_) =>
				Error::InvalidRequest { message: "Ingestion queue is full.".to_string() },
			mpsc::error::TrySendError::Closed(_) => Error::WorkerStopped,
		})?;

		Ok(RunTicket { cancel, rx })
	}

	/// Cancels the running and queued runs and stops the worker task.
	pub fn shutdown(&self) {
		self.shutdown.cancel();
	}
}

pub struct RunTicket {
	cancel: CancellationToken,
	rx: oneshot::Receiver<RunSummary>,
}
impl RunTicket {
	/// Requests cooperative cancellation; the run stops before its next message.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub async fn wait(self) -> Result<RunSummary> {
		self.rx.await.map_err(|_| Error::WorkerStopped)
	}
}

async fn run_queue(
	service: Arc<ApertureService>,
	mut rx: mpsc::Receiver<RunRequest>,
	shutdown: CancellationToken,
) {
	loop {
		let request = tokio::select! {
			_ = shutdown.cancelled() => break,
			request = rx.recv() => request,
		};
		let Some(request) = request else {
			break;
		};
		let summary = service.run_ingestion(request.limit, &request.cancel).await;

		if request.reply.send(summary).is_err() {
			tracing::debug!("Run ticket was dropped before the run finished.");
		}
	}

	tracing::info!("Ingestion worker stopped.");
}
