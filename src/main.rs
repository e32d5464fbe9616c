use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cron_orchestrator::{
    config::{Config, LogFormat, LoggingConfig},
    database::Database,
    job_scheduling::JobOrchestrator,
    repositories::{JobSeaOrmRepository, JobStore},
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "cron-orchestrator")]
#[command(version)]
#[command(about = "Multi-tenant cron job orchestrator for HTTP and shell jobs")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level (overrides config file)
    #[arg(short = 'v', long)]
    log_level: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) {
    let log_filter = if logging.level == "trace" {
        format!("cron_orchestrator={},tower_http=trace", logging.level)
    } else {
        format!("cron_orchestrator={}", logging.level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into());

    match logging.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    if let Some(log_level) = cli.log_level {
        config.logging.level = log_level;
    }

    init_tracing(&config.logging);
    info!("Starting Cron Orchestrator v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", cli.config);
    info!("Using database: {}", config.database.url);

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let store: Arc<dyn JobStore> = Arc::new(JobSeaOrmRepository::new(database.connection().clone()));
    let orchestrator = Arc::new(
        JobOrchestrator::from_config(store, &config.scheduler)
            .context("Failed to build job orchestrator")?,
    );

    let report = orchestrator
        .reconcile()
        .await
        .context("Startup reconciliation failed; refusing to start with an empty trigger registry")?;
    if !report.skipped.is_empty() {
        info!(
            "{} enabled job(s) left unscheduled due to invalid schedules",
            report.skipped.len()
        );
    }

    let server = WebServer::new(&config, AppState::new(orchestrator.clone(), database))?;
    let shutdown = CancellationToken::new();
    let result = server.serve(shutdown).await;

    orchestrator.shutdown();
    info!("Cron Orchestrator stopped");
    result
}
