//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let stream_routes = Router::new()
        // Ingestion
        .route("/sensor_data", post(handlers::ingest_message))
        .route("/simulate", post(handlers::run_simulation))
        // Latest state
        .route("/data/real-time", get(handlers::realtime_data))
        .route("/devices", get(handlers::devices_overview))
        .route("/device/:device_id/status", get(handlers::device_status))
        // Anomalies
        .route("/anomalies", get(handlers::recent_anomalies))
        // Alerts
        .route("/alerts/active", get(handlers::active_alerts))
        .route("/alerts/history", get(handlers::alert_history))
        .route("/alerts/definitions", get(handlers::alert_definitions))
        .route("/alerts/definitions", put(handlers::replace_definitions))
        .route(
            "/alerts/:alert_id/acknowledge",
            post(handlers::acknowledge_alert),
        )
        // Live subscriptions
        .route("/ws", get(handlers::ws_handler));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/system/shutdown", post(handlers::shutdown_daemon))
        .nest("/stream", stream_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use emstream_alerts::{AlertManager, LogNotifier};
    use emstream_broker::SubscriptionBroker;
    use emstream_detect::ZScoreScorer;
    use emstream_pipeline::{IngestionPipeline, MemoryStore, Persistence};
    use emstream_stream::{RollingStatistics, StreamBuffer};
    use std::sync::Arc;
    use tokio::sync::watch;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = DaemonConfig::default();
        let store = Arc::new(MemoryStore::default());
        let broker = Arc::new(SubscriptionBroker::default());
        let manager = Arc::new(AlertManager::new(Arc::new(LogNotifier), 100));
        let pipeline = Arc::new(IngestionPipeline::new(
            StreamBuffer::default(),
            RollingStatistics::default(),
            Arc::new(ZScoreScorer::default()),
            Arc::clone(&manager),
            Arc::clone(&broker),
            Arc::clone(&store) as Arc<dyn Persistence>,
            config.alerts.definitions,
        ));
        let (shutdown_tx, _) = watch::channel(false);
        AppState::new(pipeline, broker, manager, store, shutdown_tx)
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sensor_data_roundtrip() {
        let state = test_state();

        let body = serde_json::json!({
            "timestamp": chrono::Utc::now(),
            "device_id": "meter-1",
            "metric_type": "voltage",
            "value": 230.0,
            "unit": "V"
        });
        let response = create_router(state.clone())
            .oneshot(json_post("/stream/sensor_data", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/stream/device/meter-1/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/stream/data/real-time?device_id=meter-1&last_seconds=60")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_reading_is_unprocessable() {
        let body = serde_json::json!({
            "timestamp": chrono::Utc::now(),
            "device_id": "",
            "metric_type": "voltage",
            "value": 230.0
        });
        let response = create_router(test_state())
            .oneshot(json_post("/stream/sensor_data", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_device_is_not_found() {
        let response = create_router(test_state())
            .oneshot(
                Request::builder()
                    .uri("/stream/device/ghost/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn acknowledge_without_active_alert_is_not_found() {
        let response = create_router(test_state())
            .oneshot(json_post(
                "/stream/alerts/voltage_high/acknowledge",
                serde_json::json!({"acknowledged_by": "operator"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
