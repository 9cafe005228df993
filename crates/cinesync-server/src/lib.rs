//! Cinesync Server
//!
//! Room registry and per-room relay for synchronized group playback.
//!
//! Two surfaces:
//! - REST room lifecycle under `/api/party/*` (create, get, join, leave)
//! - one WebSocket per room at `/ws/{room_id}` carrying sync and
//!   presence traffic
//!
//! The registry owns all room records and membership; the relay is pure
//! fan-out and never interprets sync payloads beyond boundary
//! validation and the host gate.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

use axum::Router;
use axum::routing::{get, post};
use http::{Method, header};
use tower_http::cors::{Any, CorsLayer};

pub mod config;
pub mod handler;
pub mod relay;
pub mod room_state;

use relay::RelayHub;
use room_state::RoomStore;

/// Shared handler state: the registry and the relay hub.
#[derive(Clone)]
pub struct AppState {
    pub store: RoomStore,
    pub relay: RelayHub,
}

impl AppState {
    pub fn new(relay_capacity: usize) -> Self {
        Self {
            store: RoomStore::new(),
            relay: RelayHub::new(relay_capacity),
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-user-id"),
        ]);

    Router::new()
        .route("/api/party/create", post(handler::rooms::create))
        .route("/api/party/{room_id}", get(handler::rooms::get))
        .route("/api/party/{room_id}/join", post(handler::rooms::join))
        .route("/api/party/{room_id}/leave", post(handler::rooms::leave))
        .route("/ws/{room_id}", get(handler::ws::upgrade))
        .layer(cors)
        .with_state(state)
}
