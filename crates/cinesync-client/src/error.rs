//! Client error taxonomy.
//!
//! `RoomNotFound` is non-retryable and surfaced immediately; transport
//! failures are retried by the supervisor and only ever reach the
//! application as a "reconnecting" indication; playback rejection is
//! reported once and never retried automatically.

use cinesync_proto::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("watch party not found")]
    RoomNotFound,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("room API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("session is shut down")]
    SessionClosed,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
