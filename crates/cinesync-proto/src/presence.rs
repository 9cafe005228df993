//! Membership presence events.

use serde::{Deserialize, Serialize};

/// Whether a presence update announces an arrival or a departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceKind {
    Join,
    Leave,
}

/// A membership change plus the full participant snapshot after it.
///
/// Carrying the snapshot means subscribers never have to reconstruct
/// the member list from a stream of deltas; a late or re-joining peer
/// is correct after one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub kind: PresenceKind,
    pub user_id: String,
    pub participants: Vec<String>,
}

impl PresenceUpdate {
    pub fn join(user_id: impl Into<String>, participants: Vec<String>) -> Self {
        Self {
            kind: PresenceKind::Join,
            user_id: user_id.into(),
            participants,
        }
    }

    pub fn leave(user_id: impl Into<String>, participants: Vec<String>) -> Self {
        Self {
            kind: PresenceKind::Leave,
            user_id: user_id.into(),
            participants,
        }
    }
}
