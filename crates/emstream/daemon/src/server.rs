//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::notifier;
use emstream_alerts::AlertManager;
use emstream_broker::SubscriptionBroker;
use emstream_detect::ZScoreScorer;
use emstream_pipeline::{IngestionPipeline, MemoryStore, Persistence};
use emstream_stream::{RollingStatistics, StreamBuffer};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// EMStream daemon server
pub struct Server {
    config: DaemonConfig,
    pipeline: Arc<IngestionPipeline>,
    broker: Arc<SubscriptionBroker>,
    manager: Arc<AlertManager>,
    store: Arc<MemoryStore>,
}

impl Server {
    /// Wire the pipeline from configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let notifier = notifier::build(&config.notifications)
            .map_err(|err| DaemonError::Config(err.to_string()))?;

        let store = Arc::new(MemoryStore::new(
            config.stream.buffer_capacity,
            MemoryStore::DEFAULT_ANOMALIES,
            config.alerts.history_capacity,
        ));
        let broker = Arc::new(SubscriptionBroker::new(config.broker.channel_depth));
        let manager = Arc::new(AlertManager::new(notifier, config.alerts.history_capacity));

        let pipeline = Arc::new(IngestionPipeline::new(
            StreamBuffer::new(config.stream.buffer_capacity),
            RollingStatistics::new(config.stream.window_size, config.stream.tail_size),
            Arc::new(ZScoreScorer::new(config.detector)),
            Arc::clone(&manager),
            Arc::clone(&broker),
            Arc::clone(&store) as Arc<dyn Persistence>,
            config.alerts.definitions.clone(),
        ));

        Ok(Self {
            config,
            pipeline,
            broker,
            manager,
            store,
        })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = AppState::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.broker),
            Arc::clone(&self.manager),
            Arc::clone(&self.store),
            shutdown_tx,
        );

        let app = create_router(state);
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("emstream daemon listening on {}", addr);
        tracing::info!(
            definitions = self.config.alerts.definitions.len(),
            "alert definitions loaded"
        );

        // Retention flush loop
        let pipeline = Arc::clone(&self.pipeline);
        let retention = chrono::Duration::seconds(self.config.stream.retention_secs as i64);
        let flush_interval = Duration::from_secs(self.config.stream.flush_interval_secs.max(1));
        let mut flush_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let flushed = pipeline.flush_older_than(retention);
                        if flushed > 0 {
                            tracing::debug!(flushed, "retention pass complete");
                        }
                    }
                    _ = flush_shutdown.changed() => break,
                }
            }
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown_rx))
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("emstream daemon shutting down");
        Ok(())
    }
}

/// Graceful shutdown on Ctrl+C, SIGTERM, or an API shutdown request
async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
        _ = shutdown_rx.changed() => {
            tracing::info!("Shutdown requested, initiating graceful shutdown");
        }
    }
}
