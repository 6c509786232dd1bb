//! Alert lifecycle handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use emstream_alerts::AlertError;
use emstream_types::{AlertDefinition, AlertInstance};
use serde::{Deserialize, Serialize};

/// Currently firing alert instances
pub async fn active_alerts(State(state): State<AppState>) -> Json<Vec<AlertInstance>> {
    Json(state.manager.active_alerts())
}

/// Resolved alert history, oldest first
pub async fn alert_history(State(state): State<AppState>) -> Json<Vec<AlertInstance>> {
    Json(state.manager.history())
}

/// Currently loaded alert definitions
pub async fn alert_definitions(State(state): State<AppState>) -> Json<Vec<AlertDefinition>> {
    Json(state.pipeline.definitions())
}

/// Replace the loaded definition set without a restart
pub async fn replace_definitions(
    State(state): State<AppState>,
    Json(definitions): Json<Vec<AlertDefinition>>,
) -> ApiResult<Json<Vec<AlertDefinition>>> {
    for definition in &definitions {
        if definition.alert_id.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "alert_id must not be empty".to_string(),
            ));
        }
    }
    state.pipeline.set_definitions(definitions);
    Ok(Json(state.pipeline.definitions()))
}

/// Acknowledgment request body
#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub acknowledged_by: String,
}

/// Acknowledgment response
#[derive(Debug, Serialize)]
pub struct AcknowledgeResponse {
    pub status: String,
    pub instance: AlertInstance,
}

/// Acknowledge an active alert, halting its escalation
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    Json(request): Json<AcknowledgeRequest>,
) -> ApiResult<Json<AcknowledgeResponse>> {
    if request.acknowledged_by.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "acknowledged_by must not be empty".to_string(),
        ));
    }

    let instance = state
        .manager
        .acknowledge(&alert_id, &request.acknowledged_by)
        .map_err(|err| match err {
            AlertError::NotFound(id) => ApiError::NotFound(format!("active alert {}", id)),
        })?;

    Ok(Json(AcknowledgeResponse {
        status: "acknowledged".to_string(),
        instance,
    }))
}
