use crate::room::RoomRegistry;
use crate::signaling::{SignalingService, ws_handler};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// Shared server state, built once at startup and handed to every connection.
pub struct AppState {
    pub signaling: SignalingService,
    pub registry: RoomRegistry,
}

impl AppState {
    pub fn new(room_inbox: usize) -> Self {
        let signaling = SignalingService::new();
        let registry = RoomRegistry::with_inbox_capacity(Arc::new(signaling.clone()), room_inbox);

        Self {
            signaling,
            registry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rooms: usize,
    pub connections: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rooms: state.registry.room_count(),
        connections: state.signaling.connection_count(),
    })
}

/// `GET /ws` upgrades to the signaling channel, `GET /health` reports load.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}
