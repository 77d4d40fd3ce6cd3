//! # zendb
//!
//! Runs the incremental Zendesk extraction once, or on the configured schedule.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use zendb::config::ConfigManager;
use zendb::database::{DatabaseConnection, Persistence};
use zendb::execution::Dispatcher;
use zendb::logging::init_structured_logging;
use zendb::pipeline::{run_periodically, Orchestrator};
use zendb::source::{HttpFetcher, ZendeskSource};

#[derive(Parser)]
#[command(name = "zendb")]
#[command(about = "Incrementally extract Zendesk data into PostgreSQL")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to the configuration file (TOML, JSON or YAML)
    config: PathBuf,

    /// Run once and exit, even when a schedule is configured
    #[arg(long)]
    once: bool,

    /// Apply database migrations before running
    #[arg(long)]
    migrate: bool,

    /// Print the effective configuration (secrets masked) and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let manager = ConfigManager::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
        return Ok(());
    }

    let config = manager.config();
    info!(config = %manager.debug_config(), "Configuration loaded");

    let connection = DatabaseConnection::connect(&config.database)
        .await
        .context("connecting to the database")?;
    if cli.migrate && !config.database.run_migrations {
        connection.migrate().await.context("applying migrations")?;
    }

    let fetcher = HttpFetcher::new(&config.zendesk, config.dispatcher.request_timeout())
        .context("building the HTTP client")?;
    let dispatcher = Arc::new(Dispatcher::start(Arc::new(fetcher), &config.dispatcher));

    let orchestrator = Orchestrator::new(
        Arc::clone(&dispatcher),
        Persistence::from_connection(&connection),
        ZendeskSource::new(&config.zendesk).context("building API endpoints")?,
        config.pipeline.clone(),
    );

    match config.pipeline.schedule_interval_seconds {
        Some(seconds) if !cli.once => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
                info!("Shutdown signal received");
            };
            run_periodically(Duration::from_secs(seconds), shutdown, || orchestrator.run()).await;
        }
        _ => {
            let report = orchestrator.run().await;
            report.log();
        }
    }

    dispatcher.stop().await;
    connection.close().await;
    Ok(())
}
