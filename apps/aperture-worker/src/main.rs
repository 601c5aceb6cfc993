use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = aperture_worker::Args::parse();

	aperture_worker::run(args).await
}
