//! occp-collector - Main entry point
//!
//! Standalone tweet collection agent: serves the capture intake and status
//! surface, and delivers extracted tweets to the OCCP backend in batches.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};

use occp_collector::collector::{HttpIngestionClient, StateStore};
use occp_collector::config::{CliOverrides, CollectorConfig, MODULE_NAME};
use occp_collector::extractor::Extractor;
use occp_collector::interceptor::har::load_har;
use occp_collector::logging;
use occp_collector::{build_router, start_pipeline};
use occp_common::config::{resolve_config_path, RootFolderInitializer};

/// Upper bound on the shutdown drain
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Command-line arguments for occp-collector
#[derive(Parser, Debug)]
#[command(name = "occp-collector")]
#[command(about = "Tweet collection agent for OCCP")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/occp/collector.toml, or OCCP_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder for the state database (or OCCP_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "OCCP_COLLECTOR_PORT")]
    port: Option<u16>,

    /// Backend base URL
    #[arg(short, long, env = "OCCP_BACKEND_URL")]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the collector service (default)
    Serve,
    /// Feed a HAR capture through the pipeline and deliver the tweets
    Replay {
        /// HAR file exported from browser devtools
        har: PathBuf,
    },
    /// Print the tweets found in a JSON payload, one per line
    Extract {
        /// Response body saved as JSON
        json: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Tracing first, so config loading can report what it falls back to
    let log_filter = logging::init();

    let config_path = resolve_config_path(args.config.as_deref(), MODULE_NAME);
    let config = CollectorConfig::load(
        config_path.as_deref(),
        CliOverrides {
            root_folder: args.root_folder,
            port: args.port,
            backend_url: args.backend_url,
        },
    )
    .context("Failed to load configuration")?;

    if let Err(e) = log_filter.apply_config(&config) {
        warn!("Failed to apply configured log level: {}", e);
    }
    log_config_source(config_path.as_deref());

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Replay { har } => replay(config, &har).await,
        Command::Extract { json } => extract(&config, &json),
    }
}

fn log_config_source(path: Option<&Path>) {
    match path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => info!("Config file {} not found, using defaults", path.display()),
        None => info!("No config file location, using defaults"),
    }
}

async fn serve(config: CollectorConfig) -> Result<()> {
    info!(
        "Starting occp-collector v{} on {}",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr()
    );
    info!("Backend: {}", config.backend_url);
    info!("Root folder: {}", config.root_folder.display());

    RootFolderInitializer::new(config.root_folder.clone())
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let store = StateStore::open(&config.database_path)
        .await
        .context("Failed to open state database")?;
    let sink = Arc::new(
        HttpIngestionClient::new(&config.backend_url, config.request_timeout)
            .context("Failed to create ingestion client")?,
    );
    info!("Delivering to {}", sink.endpoint());

    let pipeline = start_pipeline(&config, sink, Some(store))
        .await
        .context("Failed to start collector")?;

    let app = build_router(pipeline.app_state());

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr()))?;

    info!("Control panel: http://{}/panel", config.listen_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("HTTP server stopped, draining collector queue");
    match tokio::time::timeout(SHUTDOWN_GRACE, pipeline.collector.shutdown()).await {
        Ok(Ok(report)) => info!(
            delivered = report.delivered,
            lost = report.remaining,
            "Collector shutdown complete"
        ),
        Ok(Err(e)) => warn!("Collector shutdown failed: {}", e),
        Err(_) => warn!("Collector drain timed out after {:?}", SHUTDOWN_GRACE),
    }

    Ok(())
}

async fn replay(config: CollectorConfig, har_path: &Path) -> Result<()> {
    let exchanges = load_har(har_path)
        .with_context(|| format!("Failed to read HAR file {}", har_path.display()))?;
    info!("Replaying {} exchanges from {}", exchanges.len(), har_path.display());

    let sink = Arc::new(
        HttpIngestionClient::new(&config.backend_url, config.request_timeout)
            .context("Failed to create ingestion client")?,
    );
    // Replay counters stay out of the service's database
    let pipeline = start_pipeline(&config, sink, None)
        .await
        .context("Failed to start collector")?;

    let mut matched = 0;
    let mut extracted = 0;
    for exchange in &exchanges {
        if pipeline.interceptor.matches(&exchange.url) {
            matched += 1;
        }
        let tweets = pipeline
            .interceptor
            .capture(&exchange.url, exchange.status, &exchange.body);
        if tweets.is_empty() {
            continue;
        }
        extracted += tweets.len();
        pipeline.collector.submit_tweets(tweets).await?;
    }

    let report = pipeline.collector.shutdown().await?;

    println!("exchanges:   {}", exchanges.len());
    println!("matched:     {}", matched);
    println!("extracted:   {}", extracted);
    println!("collected:   {}", report.stats.tweets_collected);
    println!("sent:        {}", report.stats.tweets_sent);
    println!("dropped:     {}", report.stats.tweets_dropped);
    println!("undelivered: {}", report.remaining);

    Ok(())
}

fn extract(config: &CollectorConfig, json_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(json_path)
        .with_context(|| format!("Failed to read {}", json_path.display()))?;
    let payload: serde_json::Value =
        serde_json::from_str(&text).context("Payload is not valid JSON")?;

    let tweets = Extractor::new(config.max_depth).extract(&payload);
    for tweet in &tweets {
        println!("{}", serde_json::to_string(tweet)?);
    }
    info!("Extracted {} tweets", tweets.len());
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
