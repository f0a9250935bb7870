// Collector entry point: download the match CSV and refill the raw
// collection.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use goalcast_core::config;
use goalcast_etl::acquisition::{self, HttpSource};
use goalcast_etl::cli::CollectorCli;
use goalcast_etl::logging::init_tracing;
use goalcast_etl::store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CollectorCli::parse();

    init_tracing()?;
    info!("collector starting");

    let config = config::load_config(&cli.config_dir).context("failed to load configuration")?;

    let db_path = cli.config_dir.join(&config.database.path);
    let db_path = db_path.to_string_lossy();
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {db_path}");

    let source = HttpSource::new(config.source.url.clone());
    info!(url = %config.source.url, "downloading soccer matches data");
    let summary = acquisition::collect(&config, &source, &db).await?;

    info!(
        parsed = summary.parsed,
        incomplete = summary.incomplete,
        stored = summary.stored,
        "collector finished"
    );
    Ok(())
}
