//! Cinesync Protocol Library
//!
//! Wire message types shared by the relay server and the sync client.
//!
//! Everything that crosses the network is defined here: the relay
//! envelopes ([`ClientMessage`] / [`ServerMessage`]), the sync and
//! presence payloads they carry, and the REST DTOs for the room
//! lifecycle API. Payloads are internally tagged JSON, validated on
//! decode: a malformed frame is a [`ProtocolError`], never a silently
//! propagated half-parsed value.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod message;
pub mod presence;
pub mod rest;
pub mod sync;

pub use message::{ClientMessage, ProtocolError, ServerMessage};
pub use presence::{PresenceKind, PresenceUpdate};
pub use rest::{CreateRoomRequest, LeaveResponse, RoomSnapshot};
pub use sync::{SyncAction, SyncEvent};

/// Sender id the server uses for state catch-up messages it originates
/// itself (e.g. bringing a late joiner up to the room's current
/// position). Never a real member id, so clients apply it like any
/// other remote event.
pub const SYSTEM_USER_ID: &str = "system";
