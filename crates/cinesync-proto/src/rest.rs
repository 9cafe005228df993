//! DTOs for the room lifecycle REST API.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/party/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub movie_id: String,
}

/// Room state as returned by create/get/join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub movie_id: String,
    pub host_user_id: String,
    pub participants: Vec<String>,
    pub current_time: f64,
    pub is_playing: bool,
}

/// Ack body of `POST /api/party/{roomId}/leave`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_snapshot_wire_names() {
        let snapshot = RoomSnapshot {
            room_id: "r1".into(),
            movie_id: "m1".into(),
            host_user_id: "u1".into(),
            participants: vec!["u1".into()],
            current_time: 0.0,
            is_playing: false,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"roomId\":\"r1\""));
        assert!(json.contains("\"hostUserId\":\"u1\""));
        assert!(json.contains("\"isPlaying\":false"));

        let back: RoomSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
