use anyhow::Result;
use clap::Parser;
use log::info;

use arcgis_cli::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Log to file, truncated on each run
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("arcgis-cli.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let args = Cli::parse();
    info!("Starting arcgis-cli");

    run(args).await
}
