pub mod schedule;

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aperture_service::{ApertureService, IngestionWorker};
use aperture_storage::{db::Db, qdrant::QdrantStore};

use crate::schedule::Scheduler;

#[derive(Debug, Parser)]
#[command(
	version = aperture_cli::VERSION,
	rename_all = "kebab",
	styles = aperture_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Run one ingestion pass and one repair pass, then exit.
	#[arg(long)]
	pub once: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = aperture_config::load(&args.config)?;

	init_tracing(&config);

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let qdrant = QdrantStore::new(&config.storage.qdrant)?;

	qdrant.ensure_collection().await?;

	let limit = config.ingestion.batch_limit;
	let interval = Duration::from_millis(config.ingestion.interval_ms);
	let service = Arc::new(ApertureService::new(config, db, qdrant)?);
	let (handle, task) = IngestionWorker::spawn(service.clone());
	let scheduler = Scheduler::new(service, handle.clone(), limit, interval);

	tracing::info!(once = args.once, limit, "Ingestion worker started.");

	if args.once {
		scheduler.tick().await?;
	} else {
		scheduler.run_until_shutdown().await;
	}

	handle.shutdown();
	task.await?;

	Ok(())
}

fn init_tracing(config: &aperture_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
