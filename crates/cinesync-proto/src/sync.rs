//! Playback synchronization events.

use serde::{Deserialize, Serialize};

/// The local media transition that triggered a sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Play,
    Pause,
    Seek,
}

/// A play/pause/seek notification broadcast by the room host.
///
/// Transient by design: the room's playback state is whatever the last
/// applied event said it was. `current_time` is the host's media
/// position in seconds at the moment of the transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub user_id: String,
    pub current_time: f64,
    pub is_playing: bool,
    pub action: SyncAction,
}

impl SyncEvent {
    pub fn new(
        user_id: impl Into<String>,
        current_time: f64,
        is_playing: bool,
        action: SyncAction,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            current_time,
            is_playing,
            action,
        }
    }

    /// A playback position must be a finite, non-negative number of
    /// seconds. NaN or negative values coming off the wire are a
    /// protocol violation, not something to clamp.
    pub fn is_valid(&self) -> bool {
        self.current_time.is_finite() && self.current_time >= 0.0 && !self.user_id.is_empty()
    }
}
