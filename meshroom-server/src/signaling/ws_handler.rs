use crate::AppState;
use crate::room::not_a_member;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use meshroom_core::{Capabilities, ClientMessage, ConnectionId, Participant, RoomId, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.signaling.add_peer(connection_id, tx);
    state
        .signaling
        .send_signal(connection_id, &ServerMessage::Welcome { connection_id });

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(signal) => handle_client_message(&state, connection_id, signal).await,
                        Err(e) => {
                            warn!("Invalid ClientMessage from {}: {}", connection_id, e);
                            let reject = ServerMessage::Error {
                                reason: format!("malformed frame: {e}"),
                            };
                            state.signaling.send_signal(connection_id, &reject);
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.signaling.remove_peer(&connection_id);
    let rooms = state.registry.disconnect_all(connection_id).await;
    info!(
        "WebSocket disconnected: {} (left {} room(s))",
        connection_id,
        rooms.len()
    );
}

/// Applies one client frame to the registry.
///
/// Frames are handled to completion before the next one from the same
/// connection is read, which preserves per-connection ordering.
pub async fn handle_client_message(state: &AppState, from: ConnectionId, msg: ClientMessage) {
    match msg {
        ClientMessage::JoinRoom {
            room_id,
            display_name,
            peer_address,
            video_enabled,
            audio_enabled,
        } => {
            let participant = Participant::new(from, display_name, peer_address)
                .with_capabilities(Capabilities::new(video_enabled, audio_enabled));

            if let Err(e) = state.registry.join(&room_id, participant).await {
                error!("Join of {} failed: {}", from, e);
                let reject = ServerMessage::Error {
                    reason: e.to_string(),
                };
                state.signaling.send_signal(from, &reject);
            }
        }

        ClientMessage::ToggleState {
            room_id,
            video_enabled,
            audio_enabled,
        } => {
            let capabilities = Capabilities::new(video_enabled, audio_enabled);
            if !state
                .registry
                .set_capabilities(&room_id, from, capabilities)
                .await
            {
                reject_unknown_room(state, from, &room_id, "Toggle");
            }
        }

        ClientMessage::AnnounceAddress {
            room_id,
            peer_address,
        } => {
            if !state
                .registry
                .set_peer_address(&room_id, from, peer_address)
                .await
            {
                reject_unknown_room(state, from, &room_id, "Address");
            }
        }

        ClientMessage::SendMessage { room_id, text } => {
            if !state.registry.relay_chat(&room_id, from, text).await {
                reject_unknown_room(state, from, &room_id, "Chat");
            }
        }

        ClientMessage::LeaveRoom { room_id } => {
            if !state.registry.leave(&room_id, from).await {
                reject_unknown_room(state, from, &room_id, "Leave");
            }
        }
    }
}

fn reject_unknown_room(state: &AppState, from: ConnectionId, room_id: &RoomId, what: &str) {
    warn!("{} from {} for room '{}' it is not in", what, from, room_id);
    let reject = ServerMessage::Error {
        reason: not_a_member(room_id),
    };
    state.signaling.send_signal(from, &reject);
}
