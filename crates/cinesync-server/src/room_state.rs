//! Room state management.
//!
//! The registry exclusively owns room records and membership; peers
//! reach it only through create/get/join/leave. The roomId itself is
//! the shared secret: any authenticated identity may join a room it
//! knows the id of.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cinesync_proto::rest::RoomSnapshot;
use http::StatusCode;
use parking_lot::RwLock;
use uuid::Uuid;

/// Last playback state the host broadcast, retained so a late joiner
/// can be brought up to date immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackState {
    pub current_time: f64,
    pub is_playing: bool,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub movie_id: String,
    pub host_user_id: String,
    pub created_at: DateTime<Utc>,
    /// Members in join order; the host is always first.
    members: Vec<String>,
    pub playback: PlaybackState,
}

impl Room {
    fn new(movie_id: String, host_user_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            movie_id,
            members: vec![host_user_id.clone()],
            host_user_id,
            created_at: Utc::now(),
            playback: PlaybackState::default(),
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_user_id == user_id
    }

    /// Idempotent: rejoin is a no-op. Returns whether the set changed.
    fn add_member(&mut self, user_id: &str) -> bool {
        if self.members.iter().any(|m| m == user_id) {
            return false;
        }
        self.members.push(user_id.to_string());
        true
    }

    fn remove_member(&mut self, user_id: &str) -> bool {
        let initial_len = self.members.len();
        self.members.retain(|m| m != user_id);
        self.members.len() < initial_len
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            movie_id: self.movie_id.clone(),
            host_user_id: self.host_user_id.clone(),
            participants: self.members.clone(),
            current_time: self.playback.current_time,
            is_playing: self.playback.is_playing,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("watch party not found")]
    NotFound,
}

impl RoomError {
    pub fn status(&self) -> StatusCode {
        match self {
            RoomError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

/// Why a room was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    HostLeft,
    Empty,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::HostLeft => "host left",
            CloseReason::Empty => "room empty",
        }
    }
}

/// Result of a leave call. Leave is idempotent: leaving a room you are
/// not in, or one that no longer exists, is a no-op rather than an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Member removed; the room lives on with these participants.
    Left { participants: Vec<String> },
    /// The leave closed the room (host departure or last member out).
    Closed { reason: CloseReason },
    NoOp,
}

/// Process-wide room registry: an in-memory map with a single interior
/// lock. Rooms are garbage-collected the moment they close, so the map
/// never accumulates dead entries.
#[derive(Debug, Default, Clone)]
pub struct RoomStore {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always succeeds; repeated calls make distinct rooms.
    pub fn create_room(&self, movie_id: String, host_user_id: String) -> Room {
        let room = Room::new(movie_id, host_user_id);
        let mut rooms = self.rooms.write();
        rooms.insert(room.id.clone(), room.clone());
        room
    }

    pub fn get(&self, room_id: &str) -> Result<Room, RoomError> {
        let rooms = self.rooms.read();
        rooms.get(room_id).cloned().ok_or(RoomError::NotFound)
    }

    pub fn is_host(&self, room_id: &str, user_id: &str) -> Result<bool, RoomError> {
        let rooms = self.rooms.read();
        rooms
            .get(room_id)
            .map(|room| room.is_host(user_id))
            .ok_or(RoomError::NotFound)
    }

    /// Add a member (idempotent) and return the updated room.
    pub fn join(&self, room_id: &str, user_id: &str) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(room_id).ok_or(RoomError::NotFound)?;
        room.add_member(user_id);
        Ok(room.clone())
    }

    /// Remove a member. The host leaving closes the room; host
    /// identity is immutable for the room's lifetime, so there is no
    /// promotion. An emptied room is removed as well.
    pub fn leave(&self, room_id: &str, user_id: &str) -> LeaveOutcome {
        let mut rooms = self.rooms.write();
        let Some(room) = rooms.get_mut(room_id) else {
            return LeaveOutcome::NoOp;
        };

        if !room.remove_member(user_id) {
            return LeaveOutcome::NoOp;
        }

        if room.is_host(user_id) {
            rooms.remove(room_id);
            return LeaveOutcome::Closed {
                reason: CloseReason::HostLeft,
            };
        }

        if room.members.is_empty() {
            rooms.remove(room_id);
            return LeaveOutcome::Closed {
                reason: CloseReason::Empty,
            };
        }

        LeaveOutcome::Left {
            participants: room.members.clone(),
        }
    }

    /// Record the playback state carried by a host sync event.
    pub fn update_playback(
        &self,
        room_id: &str,
        current_time: f64,
        is_playing: bool,
    ) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(room_id).ok_or(RoomError::NotFound)?;
        room.playback = PlaybackState {
            current_time,
            is_playing,
        };
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_room_host_is_first_member() {
        let store = RoomStore::new();
        let room = store.create_room("m1".into(), "host".into());

        assert_eq!(room.members(), ["host"]);
        assert!(room.is_host("host"));
        assert!(!room.playback.is_playing);
    }

    #[test]
    fn test_get_unknown_room_not_found() {
        let store = RoomStore::new();
        assert!(matches!(store.get("nope"), Err(RoomError::NotFound)));
        assert_eq!(RoomError::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_join_idempotent() {
        let store = RoomStore::new();
        let room = store.create_room("m1".into(), "host".into());

        store.join(&room.id, "u2").unwrap();
        let after_rejoin = store.join(&room.id, "u2").unwrap();

        // u2 appears exactly once.
        assert_eq!(after_rejoin.members(), ["host", "u2"]);
    }

    #[test]
    fn test_leave_keeps_room_for_remaining_members() {
        let store = RoomStore::new();
        let room = store.create_room("m1".into(), "host".into());
        store.join(&room.id, "u2").unwrap();
        store.join(&room.id, "u3").unwrap();

        let outcome = store.leave(&room.id, "u2");
        assert_eq!(
            outcome,
            LeaveOutcome::Left {
                participants: vec!["host".into(), "u3".into()],
            }
        );
        assert_eq!(store.room_count(), 1);
    }

    #[test]
    fn test_host_leave_closes_room() {
        let store = RoomStore::new();
        let room = store.create_room("m1".into(), "host".into());
        store.join(&room.id, "u2").unwrap();

        let outcome = store.leave(&room.id, "host");
        assert_eq!(
            outcome,
            LeaveOutcome::Closed {
                reason: CloseReason::HostLeft,
            }
        );
        assert!(matches!(store.get(&room.id), Err(RoomError::NotFound)));
    }

    #[test]
    fn test_closed_rooms_are_garbage_collected() {
        let store = RoomStore::new();
        let room = store.create_room("m1".into(), "host".into());
        store.join(&room.id, "u2").unwrap();

        store.leave(&room.id, "u2");
        store.leave(&room.id, "host");

        assert_eq!(store.room_count(), 0);
    }

    #[test]
    fn test_leave_is_idempotent() {
        let store = RoomStore::new();
        let room = store.create_room("m1".into(), "host".into());

        assert_eq!(store.leave(&room.id, "stranger"), LeaveOutcome::NoOp);
        assert_eq!(store.leave("unknown-room", "host"), LeaveOutcome::NoOp);
    }

    #[test]
    fn test_update_playback() {
        let store = RoomStore::new();
        let room = store.create_room("m1".into(), "host".into());

        store.update_playback(&room.id, 42.5, true).unwrap();
        let fetched = store.get(&room.id).unwrap();
        assert_eq!(fetched.playback.current_time, 42.5);
        assert!(fetched.playback.is_playing);

        assert!(matches!(
            store.update_playback("unknown", 0.0, false),
            Err(RoomError::NotFound)
        ));
    }
}
