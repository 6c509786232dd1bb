//! Application state for API handlers

use emstream_alerts::AlertManager;
use emstream_broker::SubscriptionBroker;
use emstream_pipeline::{IngestionPipeline, MemoryStore};
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Ingestion pipeline
    pub pipeline: Arc<IngestionPipeline>,

    /// Subscription broker for fan-out
    pub broker: Arc<SubscriptionBroker>,

    /// Alert manager
    pub manager: Arc<AlertManager>,

    /// In-memory persistence backend
    pub store: Arc<MemoryStore>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Graceful shutdown signal sender
    pub shutdown_tx: watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<IngestionPipeline>,
        broker: Arc<SubscriptionBroker>,
        manager: Arc<AlertManager>,
        store: Arc<MemoryStore>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            pipeline,
            broker,
            manager,
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
            shutdown_tx,
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = chrono::Utc::now() - self.started_at;
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
