//! Ingestion and latest-state handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::simulate;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use emstream_pipeline::LatestReading;
use emstream_types::{AnomalyRecord, AnomalyResult, StreamMessage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response for an accepted reading
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    pub analysis: AnomalyResult,
}

/// Ingest one sensor reading
pub async fn ingest_message(
    State(state): State<AppState>,
    Json(message): Json<StreamMessage>,
) -> ApiResult<Json<IngestResponse>> {
    let analysis = state.pipeline.ingest(message).await?;
    Ok(Json(IngestResponse {
        status: "accepted".to_string(),
        analysis,
    }))
}

/// Query parameters for the real-time data window
#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub device_id: Option<String>,
    pub metric_type: Option<String>,
    #[serde(default = "default_last_seconds")]
    pub last_seconds: i64,
}

fn default_last_seconds() -> i64 {
    60
}

/// Buffered readings from the last `last_seconds`, optionally filtered by
/// device and metric, in arrival order
pub async fn realtime_data(
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
) -> ApiResult<Json<Vec<StreamMessage>>> {
    if query.last_seconds <= 0 {
        return Err(ApiError::BadRequest(
            "last_seconds must be positive".to_string(),
        ));
    }

    let messages = state
        .pipeline
        .recent(chrono::Duration::seconds(query.last_seconds))
        .into_iter()
        .filter(|m| {
            query
                .device_id
                .as_ref()
                .map_or(true, |device_id| &m.device_id == device_id)
        })
        .filter(|m| {
            query
                .metric_type
                .as_ref()
                .map_or(true, |metric_type| &m.metric_type == metric_type)
        })
        .collect();
    Ok(Json(messages))
}

/// Latest scored readings for every device
pub async fn devices_overview(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, BTreeMap<String, LatestReading>>> {
    Json(state.pipeline.overview())
}

/// Latest scored readings for one device
pub async fn device_status(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<BTreeMap<String, LatestReading>>> {
    state
        .pipeline
        .device_status(&device_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("device {}", device_id)))
}

/// Query parameters for the anomaly log
#[derive(Debug, Deserialize)]
pub struct AnomalyQuery {
    #[serde(default = "default_anomaly_limit")]
    pub limit: usize,
}

fn default_anomaly_limit() -> usize {
    100
}

/// Recent anomalies, newest first
pub async fn recent_anomalies(
    State(state): State<AppState>,
    Query(query): Query<AnomalyQuery>,
) -> Json<Vec<AnomalyRecord>> {
    Json(state.store.recent_anomalies(query.limit))
}

/// Simulation request
#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    #[serde(default = "default_simulation_count")]
    pub count: usize,
}

fn default_simulation_count() -> usize {
    50
}

/// Simulation summary
#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub generated: usize,
    pub anomalies_flagged: usize,
}

/// Generate synthetic meter readings and run them through the pipeline
pub async fn run_simulation(
    State(state): State<AppState>,
    Json(request): Json<SimulateRequest>,
) -> ApiResult<Json<SimulateResponse>> {
    let count = request.count.min(10_000);
    if count == 0 {
        return Err(ApiError::BadRequest("count must be at least 1".to_string()));
    }

    let mut anomalies_flagged = 0;
    for message in simulate::generate(count) {
        match state.pipeline.ingest(message).await {
            Ok(analysis) if analysis.is_anomaly => anomalies_flagged += 1,
            Ok(_) => {}
            Err(err) => tracing::warn!(%err, "simulated reading rejected"),
        }
    }

    Ok(Json(SimulateResponse {
        generated: count,
        anomalies_flagged,
    }))
}
