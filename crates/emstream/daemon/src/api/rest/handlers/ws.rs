//! WebSocket subscription handler
//!
//! Clients subscribe to `{device_id}:{metric_type}` topics or the `all`
//! wildcard with JSON control messages, and receive scored readings and
//! alert transitions as they happen.

use crate::api::rest::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

/// Client control frame
#[derive(Debug, Deserialize)]
struct ControlMessage {
    action: String,
    topic: String,
}

/// Server confirmation frame
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlReply {
    SubscriptionConfirmed { topic: String, topics: Vec<String> },
    UnsubscriptionConfirmed { topic: String, topics: Vec<String> },
    Error { message: String },
}

/// Upgrade to a WebSocket subscription session
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let mut events = state.broker.register(&connection_id);
    tracing::info!(%connection_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    // Broker dropped this connection (slow consumer).
                    break;
                };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::warn!(%connection_id, %err, "event serialization failed");
                        continue;
                    }
                };
                if sink.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_control(&state, &connection_id, &text);
                        let payload = serde_json::to_string(&reply)
                            .unwrap_or_else(|_| r#"{"type":"error"}"#.to_string());
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(%connection_id, %err, "websocket receive error");
                        break;
                    }
                }
            }
        }
    }

    state.broker.disconnect(&connection_id);
    tracing::info!(%connection_id, "websocket disconnected");
}

fn handle_control(state: &AppState, connection_id: &str, text: &str) -> ControlReply {
    let control: ControlMessage = match serde_json::from_str(text) {
        Ok(control) => control,
        Err(err) => {
            return ControlReply::Error {
                message: format!("invalid control message: {}", err),
            }
        }
    };

    match control.action.as_str() {
        "subscribe" => {
            state.broker.subscribe(connection_id, &control.topic);
            ControlReply::SubscriptionConfirmed {
                topic: control.topic,
                topics: state.broker.topics_of(connection_id),
            }
        }
        "unsubscribe" => {
            state.broker.unsubscribe(connection_id, &control.topic);
            ControlReply::UnsubscriptionConfirmed {
                topic: control.topic,
                topics: state.broker.topics_of(connection_id),
            }
        }
        other => ControlReply::Error {
            message: format!("unknown action: {}", other),
        },
    }
}
