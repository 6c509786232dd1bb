//! Health and status handlers

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use emstream_pipeline::PipelineStats;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub connections: usize,
    pub stats: PipelineStats,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        connections: state.broker.connection_count(),
        stats: state.pipeline.stats(),
    })
}

/// Response body for shutdown requests
#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub status: String,
    pub message: String,
}

/// Request a graceful daemon shutdown
pub async fn shutdown_daemon(State(state): State<AppState>) -> Json<ShutdownResponse> {
    if let Err(err) = state.shutdown_tx.send(true) {
        tracing::warn!("Failed to send shutdown signal: {}", err);
        return Json(ShutdownResponse {
            status: "error".to_string(),
            message: "Unable to signal shutdown".to_string(),
        });
    }

    Json(ShutdownResponse {
        status: "accepted".to_string(),
        message: "Shutdown signal sent".to_string(),
    })
}
