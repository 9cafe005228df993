//! Per-room relay channels.
//!
//! One broadcast channel per room, fan-out only. The channel preserves
//! publish order, which is all the ordering the protocol needs: sync
//! events have a single publisher (the host), and presence may
//! interleave with sync freely.

use std::collections::HashMap;
use std::sync::Arc;

use cinesync_proto::ServerMessage;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::room_state::CloseReason;

/// Registry of live room channels.
#[derive(Debug, Clone)]
pub struct RelayHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ServerMessage>>>>,
    capacity: usize,
}

impl RelayHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Subscribe to a room's channel, creating it on first use.
    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<ServerMessage> {
        let mut channels = self.channels.write();
        channels
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Fan a message out to every subscriber. Returns the number of
    /// receivers it reached; publishing to a room with no subscribers
    /// (or no channel at all) is not an error.
    pub fn publish(&self, room_id: &str, message: &ServerMessage) -> usize {
        let channels = self.channels.read();
        match channels.get(room_id) {
            Some(tx) => tx.send(message.clone()).unwrap_or(0),
            None => 0,
        }
    }

    /// Announce closure and drop the channel. Subscribers receive the
    /// `RoomClosed` message and then observe the stream end.
    pub fn close(&self, room_id: &str, reason: CloseReason) {
        let removed = self.channels.write().remove(room_id);
        if let Some(tx) = removed {
            let _ = tx.send(ServerMessage::RoomClosed {
                reason: reason.as_str().to_string(),
            });
            tracing::info!(room_id = %room_id, reason = reason.as_str(), "room channel closed");
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinesync_proto::{PresenceUpdate, SyncAction, SyncEvent};

    fn sync(user_id: &str, secs: f64) -> ServerMessage {
        ServerMessage::Sync(SyncEvent::new(user_id, secs, true, SyncAction::Play))
    }

    #[tokio::test]
    async fn test_fan_out_reaches_all_subscribers() {
        let hub = RelayHub::new(16);
        let mut rx1 = hub.subscribe("r1");
        let mut rx2 = hub.subscribe("r1");

        let reached = hub.publish("r1", &sync("host", 10.0));
        assert_eq!(reached, 2);

        assert_eq!(rx1.recv().await.unwrap(), sync("host", 10.0));
        assert_eq!(rx2.recv().await.unwrap(), sync("host", 10.0));
    }

    #[tokio::test]
    async fn test_per_publisher_ordering_preserved() {
        let hub = RelayHub::new(16);
        let mut rx = hub.subscribe("r1");

        for secs in [1.0, 2.0, 3.0] {
            hub.publish("r1", &sync("host", secs));
        }
        hub.publish(
            "r1",
            &ServerMessage::Participants(PresenceUpdate::leave("u2", vec!["host".into()])),
        );

        for secs in [1.0, 2.0, 3.0] {
            assert_eq!(rx.recv().await.unwrap(), sync("host", secs));
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::Participants(_)
        ));
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let hub = RelayHub::new(16);
        let mut rx_other = hub.subscribe("r2");

        hub.publish("r1", &sync("host", 5.0));
        // r1 had no channel before this publish either way; r2 must
        // see nothing.
        hub.subscribe("r1");
        hub.publish("r1", &sync("host", 6.0));

        assert!(matches!(
            rx_other.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_close_announces_then_ends_stream() {
        let hub = RelayHub::new(16);
        let mut rx = hub.subscribe("r1");

        hub.close("r1", CloseReason::HostLeft);

        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::RoomClosed {
                reason: "host left".into(),
            }
        );
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_publish_without_channel_is_noop() {
        let hub = RelayHub::new(16);
        assert_eq!(hub.publish("ghost", &sync("host", 1.0)), 0);
    }
}
