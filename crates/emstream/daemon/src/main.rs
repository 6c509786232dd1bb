//! EMStream Daemon - Real-time energy-meter telemetry service
//!
//! The daemon provides:
//! - REST API for reading ingestion and latest-state queries
//! - Sliding-window z-score anomaly detection
//! - Threshold alerting with escalation and acknowledgment
//! - WebSocket fan-out of scored readings and alert transitions

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod notifier;
mod server;
mod simulate;

use config::DaemonConfig;
use error::DaemonResult;
use server::Server;

/// EMStream Daemon CLI
#[derive(Parser)]
#[command(name = "emstreamd")]
#[command(about = "EMStream Daemon - Real-time energy-meter telemetry service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "EMSTREAM_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "EMSTREAM_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "EMSTREAM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "EMSTREAM_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| error::DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| error::DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        "starting emstream daemon"
    );

    // Create and run server
    let server = Server::new(config)?;
    server.run().await
}
