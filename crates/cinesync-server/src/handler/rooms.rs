//! REST room lifecycle handlers.
//!
//! `POST /api/party/create`, `GET /api/party/{room_id}`,
//! `POST /api/party/{room_id}/join`, `POST /api/party/{room_id}/leave`.
//! Registry errors surface synchronously here so the caller can present
//! actionable feedback; nothing retries.

use axum::Json;
use axum::extract::{FromRequestParts, Path, State};
use axum::response::{IntoResponse, Response};
use cinesync_proto::rest::{CreateRoomRequest, LeaveResponse, RoomSnapshot};
use cinesync_proto::{PresenceUpdate, ServerMessage};
use http::StatusCode;
use http::request::Parts;
use serde_json::json;

use crate::AppState;
use crate::room_state::{LeaveOutcome, RoomError};

/// Caller identity from the `x-user-id` header.
///
/// Identity issuance is an upstream concern (the auth gateway resolves
/// tokens before traffic reaches this service); the registry only needs
/// a stable opaque string per user.
pub struct UserId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "missing x-user-id header" })),
                )
                    .into_response()
            })
    }
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn create(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<CreateRoomRequest>,
) -> Json<RoomSnapshot> {
    let room = state.store.create_room(request.movie_id, user_id);
    tracing::info!(room_id = %room.id, movie_id = %room.movie_id, "watch party created");
    Json(room.snapshot())
}

pub async fn get(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, RoomError> {
    let room = state.store.get(&room_id)?;
    Ok(Json(room.snapshot()))
}

pub async fn join(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    UserId(user_id): UserId,
) -> Result<Json<RoomSnapshot>, RoomError> {
    let room = state.store.join(&room_id, &user_id)?;
    tracing::info!(room_id = %room.id, user_id = %user_id, "user joined watch party");

    state.relay.publish(
        &room_id,
        &ServerMessage::Participants(PresenceUpdate::join(&user_id, room.members().to_vec())),
    );

    Ok(Json(room.snapshot()))
}

pub async fn leave(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    UserId(user_id): UserId,
) -> Json<LeaveResponse> {
    match state.store.leave(&room_id, &user_id) {
        LeaveOutcome::Left { participants } => {
            tracing::info!(room_id = %room_id, user_id = %user_id, "user left watch party");
            state.relay.publish(
                &room_id,
                &ServerMessage::Participants(PresenceUpdate::leave(&user_id, participants)),
            );
        }
        LeaveOutcome::Closed { reason } => {
            tracing::info!(room_id = %room_id, user_id = %user_id, reason = reason.as_str(), "watch party closed");
            state.relay.close(&room_id, reason);
        }
        LeaveOutcome::NoOp => {}
    }

    Json(LeaveResponse {
        message: "Left room successfully".to_string(),
    })
}
