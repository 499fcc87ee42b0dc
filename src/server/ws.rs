//! WebSocket surface: one stream per team carrying the typed envelope.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use super::AppState;
use crate::teams::Team;
use crate::utils::current_time_millis;

/// WebSocket policy violation close code (RFC 6455).
const CLOSE_POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Deserialize)]
pub(super) struct WsParams {
    api_key: Option<String>,
}

/// `GET /ws?api_key=…`: upgrade and stream events for one team.
///
/// An invalid key still upgrades, then closes immediately with 1008 so
/// the client sees a proper close frame rather than a failed handshake.
pub(super) async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let team = params
        .api_key
        .as_deref()
        .and_then(|key| state.teams.authenticate(key));
    match team {
        Some(team) => ws.on_upgrade(move |socket| handle_socket(socket, state, team)),
        None => ws.on_upgrade(reject_socket),
    }
}

async fn reject_socket(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_POLICY_VIOLATION,
            reason: "invalid api_key".into(),
        })))
        .await;
}

/// Pump fan-out events into the socket under the
/// `{type, timestamp, seq, data}` envelope with a per-connection
/// monotonic `seq`.
async fn handle_socket(mut socket: WebSocket, state: AppState, team: Arc<Team>) {
    let (conn_id, mut events) = state.pipeline.connections.register(&team.team_id);
    info!("team {} connected (conn {})", team.team_id, conn_id);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            event = events.recv() => {
                // A closed channel means this connection was evicted by a
                // newer one for the same team.
                let Some(event) = event else { break };
                seq += 1;
                let envelope = json!({
                    "type": event.message_type(),
                    "timestamp": current_time_millis(),
                    "seq": seq,
                    "data": event.to_data(),
                });
                if socket.send(Message::Text(envelope.to_string())).await.is_err() {
                    debug!("write failed for team {}; dropping socket", team.team_id);
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // The stream is one-way; client frames are ignored.
                    }
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.pipeline.connections.unregister(&team.team_id, conn_id);
    info!("team {} disconnected (conn {})", team.team_id, conn_id);
}
