//! WebSocket endpoint
//!
//! On connect the client receives `connected` and a `snapshot` of the current
//! mode. Afterwards every event published on the bus is forwarded as-is.
//!
//! Client commands (JSON, tagged by `type`):
//! - `{"type":"setMode","mode":"focus"}`: switch mode; every client then
//!   receives `modeChanged` and a fresh `snapshotPublished`
//! - `{"type":"refresh"}`: reply with a fresh `snapshot` to this client only
//! - `{"type":"ping"}`: reply with `{"type":"pong"}`
//!
//! Malformed or failing commands are answered with `{"type":"error"}`.

use crate::aggregator::CompositeResult;
use crate::jobs::publish_snapshot;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Commands accepted from clients
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    SetMode { mode: String },
    Refresh,
    Ping,
}

/// Direct replies to one client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Connected {
        #[serde(rename = "clientId")]
        client_id: Uuid,
    },
    Snapshot {
        data: Box<CompositeResult>,
    },
    Pong,
    Error {
        message: String,
    },
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the initial snapshot so no event is missed in between
    let mut events = state.event_bus.subscribe();

    info!(%client_id, "WebSocket client connected");

    let greeting = ServerMessage::Connected { client_id };
    if send_json(&mut sender, &greeting).await.is_err() {
        return;
    }
    let snapshot = ServerMessage::Snapshot {
        data: Box::new(state.aggregator.aggregate_current().await),
    };
    if send_json(&mut sender, &snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_command(&state, &text).await {
                        if send_json(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(%client_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if send_json(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%client_id, skipped, "WebSocket client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!(%client_id, "WebSocket client disconnected");
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).map_err(axum::Error::new)?;
    sender.send(Message::Text(text)).await
}

/// Apply one client command; returns the reply for the sender, if any
pub async fn handle_command(state: &AppState, text: &str) -> Option<ServerMessage> {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            return Some(ServerMessage::Error {
                message: format!("Invalid command: {}", e),
            })
        }
    };

    match command {
        ClientCommand::SetMode { mode } => match state.modes.set_mode(&mode).await {
            // Everyone, including the sender, gets the snapshot via the bus
            Ok(_) => {
                publish_snapshot(state).await;
                None
            }
            Err(e) => Some(ServerMessage::Error {
                message: e.to_string(),
            }),
        },
        ClientCommand::Refresh => {
            state.aggregator.feeds().invalidate_all();
            Some(ServerMessage::Snapshot {
                data: Box::new(state.aggregator.aggregate_current().await),
            })
        }
        ClientCommand::Ping => Some(ServerMessage::Pong),
    }
}
