//! Per-room relay WebSocket endpoint.
//!
//! `GET /ws/{room_id}` upgrades into the room's channel. Client frames
//! are the tagged [`ClientMessage`] union; everything the relay fans
//! out arrives as [`ServerMessage`] frames. The relay interprets
//! nothing beyond boundary validation and the host gate; sync payloads
//! pass through untouched.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use cinesync_proto::{
    ClientMessage, PresenceUpdate, SYSTEM_USER_ID, ServerMessage, SyncAction, SyncEvent,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::AppState;
use crate::room_state::LeaveOutcome;

pub async fn upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    // Joiners validate the room before subscribing; unknown ids are
    // rejected without an upgrade.
    if let Err(err) = state.store.get(&room_id) {
        return err.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(state, room_id, socket))
}

async fn handle_socket(state: AppState, room_id: String, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let mut relay_rx = state.relay.subscribe(&room_id);

    // The user this connection announced itself as via `Join`. Sync
    // publishes are only accepted for the bound identity.
    let mut bound_user: Option<String> = None;

    loop {
        tokio::select! {
            fanned = relay_rx.recv() => match fanned {
                Ok(message) => {
                    let closing = matches!(message, ServerMessage::RoomClosed { .. });
                    if send_frame(&mut sink, &message).await.is_err() {
                        break;
                    }
                    if closing {
                        // The room is gone; nothing left to leave.
                        bound_user = None;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(room_id = %room_id, skipped, "relay subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = next_text(&mut stream) => match frame {
                Some(text) => {
                    if let Some(reply) = handle_frame(&state, &room_id, &mut bound_user, &text)
                        && send_frame(&mut sink, &reply).await.is_err()
                    {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    // An abrupt drop without a Leave still counts as leaving; a
    // vanished peer must not linger in the member set.
    if let Some(user_id) = bound_user {
        tracing::info!(room_id = %room_id, user_id = %user_id, "connection dropped, treating as leave");
        apply_leave(&state, &room_id, &user_id);
    }
}

/// Pull the next text frame, skipping pings and binary noise. `None`
/// ends the connection.
async fn next_text(stream: &mut SplitStream<WebSocket>) -> Option<String> {
    loop {
        match stream.next().await? {
            Ok(Message::Text(text)) => return Some(text.to_string()),
            Ok(Message::Close(_)) => return None,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(%err, "websocket receive error");
                return None;
            }
        }
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match message.encode() {
        Ok(frame) => sink.send(Message::Text(frame.into())).await,
        Err(err) => {
            tracing::error!(%err, "failed to encode server message");
            Ok(())
        }
    }
}

/// Process one client frame. The return value is a direct reply to this
/// connection only; fan-out goes through the relay.
fn handle_frame(
    state: &AppState,
    room_id: &str,
    bound_user: &mut Option<String>,
    frame: &str,
) -> Option<ServerMessage> {
    let message = match ClientMessage::decode(frame) {
        Ok(message) => message,
        Err(err) => {
            tracing::warn!(room_id = %room_id, %err, "rejected malformed frame");
            return Some(ServerMessage::Error {
                message: err.to_string(),
            });
        }
    };

    match message {
        ClientMessage::Join { user_id, user_name } => {
            match state.store.join(room_id, &user_id) {
                Ok(room) => {
                    tracing::info!(
                        room_id = %room_id,
                        user_id = %user_id,
                        user_name = %user_name,
                        "user joined relay channel"
                    );
                    *bound_user = Some(user_id.clone());
                    state.relay.publish(
                        room_id,
                        &ServerMessage::Participants(PresenceUpdate::join(
                            &user_id,
                            room.members().to_vec(),
                        )),
                    );

                    // Bring the new subscriber up to the room's current
                    // playback state directly, as a system-originated
                    // sync event.
                    let playback = room.playback;
                    let action = if playback.is_playing {
                        SyncAction::Play
                    } else {
                        SyncAction::Pause
                    };
                    Some(ServerMessage::Sync(SyncEvent::new(
                        SYSTEM_USER_ID,
                        playback.current_time,
                        playback.is_playing,
                        action,
                    )))
                }
                Err(err) => Some(ServerMessage::Error {
                    message: format!("Failed to join room: {err}"),
                }),
            }
        }
        ClientMessage::Leave { user_id } => {
            if bound_user.as_deref() == Some(user_id.as_str()) {
                *bound_user = None;
            }
            apply_leave(state, room_id, &user_id);
            None
        }
        ClientMessage::Sync(event) => {
            if bound_user.as_deref() != Some(event.user_id.as_str()) {
                return Some(ServerMessage::Error {
                    message: "sync event does not match connection identity".to_string(),
                });
            }
            match state.store.is_host(room_id, &event.user_id) {
                Ok(true) => {
                    // Record, then fan out. The host's own connection
                    // receives the echo too; engines discard it by id.
                    let _ = state
                        .store
                        .update_playback(room_id, event.current_time, event.is_playing);
                    state.relay.publish(room_id, &ServerMessage::Sync(event));
                    None
                }
                Ok(false) => {
                    tracing::warn!(
                        room_id = %room_id,
                        user_id = %event.user_id,
                        "refused sync publish from non-host"
                    );
                    Some(ServerMessage::Error {
                        message: "only the host controls playback".to_string(),
                    })
                }
                Err(err) => Some(ServerMessage::Error {
                    message: err.to_string(),
                }),
            }
        }
    }
}

fn apply_leave(state: &AppState, room_id: &str, user_id: &str) {
    match state.store.leave(room_id, user_id) {
        LeaveOutcome::Left { participants } => {
            state.relay.publish(
                room_id,
                &ServerMessage::Participants(PresenceUpdate::leave(user_id, participants)),
            );
        }
        LeaveOutcome::Closed { reason } => {
            state.relay.close(room_id, reason);
        }
        LeaveOutcome::NoOp => {}
    }
}
