// Goalcast ETL entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Initialize tracing
// 3. Load config (copying defaults on first run)
// 4. Open the document store
// 5. Run the requested mode

use anyhow::Context;
use clap::Parser;
use tracing::info;

use goalcast_core::config;
use goalcast_etl::cli::Cli;
use goalcast_etl::logging::init_tracing;
use goalcast_etl::orchestrator;
use goalcast_etl::store::Database;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;
    info!("goalcast-etl starting");

    let config = config::load_config(&cli.config_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: seasons {}..={}, window {}",
        config.seasons.initial_season, config.seasons.final_season, config.moving_average.window
    );

    let db_path = cli.config_dir.join(&config.database.path);
    let db_path = db_path.to_string_lossy();
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {db_path}");

    let outcome = orchestrator::run(cli.mode, &config, &db)?;
    info!(?outcome, "goalcast-etl finished");
    Ok(())
}
