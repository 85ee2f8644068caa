use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use dealcast::app::AppContext;
use dealcast::pipeline::RunOutcome;
use dealcast::{AppConfig, telemetry};

#[derive(Debug, Parser)]
#[command(
    name = "dealcast",
    version,
    about = "Scrapes deal listings and posts them to a Telegram channel"
)]
struct Cli {
    /// Configuration file, defaults to config/default.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run the pipeline once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let _log_guard = telemetry::init_tracing(&config.logging)?;
    telemetry::install_metrics(&config.metrics)?;

    info!("Starting dealcast {}", env!("CARGO_PKG_VERSION"));

    let app = AppContext::build(config).await.context("Failed to initialize")?;

    if cli.once {
        match app.run_once().await {
            RunOutcome::Completed(report) => {
                info!("Published {} of {} deals", report.published, report.deals_found)
            }
            RunOutcome::Skipped => info!("Run skipped"),
        }
        app.registry.close().await;
        return Ok(());
    }

    app.run().await?;
    Ok(())
}
