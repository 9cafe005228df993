//! Relay envelopes and frame encoding.
//!
//! One WebSocket per room carries both directions of traffic, so each
//! frame is an internally tagged union. Decoding validates the payload;
//! anything that does not parse into a known, well-formed variant is a
//! [`ProtocolError`] to be rejected at the channel boundary.

use serde::{Deserialize, Serialize};

use crate::presence::PresenceUpdate;
use crate::sync::SyncEvent;

/// Protocol violation detected at the channel boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid playback position in sync event from {user_id}")]
    InvalidSyncEvent { user_id: String },
}

/// Client → server control and sync messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Announce transport-level presence on the room channel. Distinct
    /// from the REST join: the REST call validates membership, this one
    /// binds the connection to a user id and triggers the state
    /// catch-up.
    #[serde(rename_all = "camelCase")]
    Join { user_id: String, user_name: String },
    #[serde(rename_all = "camelCase")]
    Leave { user_id: String },
    Sync(SyncEvent),
}

/// Server → client fan-out messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Sync(SyncEvent),
    Participants(PresenceUpdate),
    #[serde(rename_all = "camelCase")]
    RoomClosed { reason: String },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let msg: Self = serde_json::from_str(frame)?;
        if let Self::Sync(event) = &msg
            && !event.is_valid()
        {
            return Err(ProtocolError::InvalidSyncEvent {
                user_id: event.user_id.clone(),
            });
        }
        Ok(msg)
    }
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let msg: Self = serde_json::from_str(frame)?;
        if let Self::Sync(event) = &msg
            && !event.is_valid()
        {
            return Err(ProtocolError::InvalidSyncEvent {
                user_id: event.user_id.clone(),
            });
        }
        Ok(msg)
    }
}
