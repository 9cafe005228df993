//! End-to-end session tests: real server, real supervisors, fake media.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cinesync_client::{PartySession, ProgressSink, RoomApi, SessionConfig, SessionEvent};
use cinesync_core::engine::EngineConfig;
use cinesync_core::media::{MediaHandle, PlaybackError};
use cinesync_core::test_utils::FakeMedia;
use cinesync_client::SupervisorConfig;
use cinesync_proto::SyncAction;
use cinesync_proto::rest::RoomSnapshot;
use cinesync_server::{AppState, app};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// A fake media element the test can inspect while the engine owns it.
#[derive(Clone, Default)]
struct SharedMedia(Arc<Mutex<FakeMedia>>);

impl SharedMedia {
    fn paused_at(position_secs: f64) -> Self {
        Self(Arc::new(Mutex::new(FakeMedia::paused_at(position_secs))))
    }
}

impl MediaHandle for SharedMedia {
    fn current_time(&self) -> f64 {
        self.0.lock().current_time()
    }

    fn seek(&mut self, position_secs: f64) {
        self.0.lock().seek(position_secs);
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.0.lock().play()
    }

    fn pause(&mut self) {
        self.0.lock().pause();
    }

    fn is_paused(&self) -> bool {
        self.0.lock().is_paused()
    }

    fn duration(&self) -> Option<f64> {
        self.0.lock().duration()
    }
}

async fn start_server() -> SocketAddr {
    let state = AppState::new(64);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Short settle window so tests do not sit out the production 500 ms.
fn fast_config() -> SessionConfig {
    SessionConfig {
        engine: EngineConfig {
            settle_window: Duration::from_millis(50),
            ..EngineConfig::default()
        },
        ..SessionConfig::default()
    }
}

async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("session event stream ended")
}

/// Wait for the next applied sync, skipping presence and connection
/// noise.
async fn next_sync_applied(rx: &mut mpsc::Receiver<SessionEvent>) -> cinesync_proto::SyncEvent {
    loop {
        if let SessionEvent::SyncApplied(event) = next_event(rx).await {
            return event;
        }
    }
}

async fn wait_connected(rx: &mut mpsc::Receiver<SessionEvent>) {
    loop {
        if matches!(next_event(rx).await, SessionEvent::Connected) {
            return;
        }
    }
}

#[tokio::test]
async fn test_viewer_converges_to_host_play() {
    let addr = start_server().await;
    let base = format!("http://{addr}");

    let host_api = RoomApi::new(&base, "host");
    let room = host_api.create_room("movie-1").await.unwrap();

    let host_media = SharedMedia::paused_at(0.0);
    let mut host = PartySession::spawn(
        &base,
        &room,
        "host",
        "Host",
        host_media.clone(),
        None,
        fast_config(),
    );
    let mut host_events = host.take_events().unwrap();
    wait_connected(&mut host_events).await;
    // Catch-up sync from the room's initial state.
    next_sync_applied(&mut host_events).await;

    let viewer_api = RoomApi::new(&base, "viewer");
    let joined = viewer_api.join_room(&room.room_id).await.unwrap();
    assert_eq!(joined.participants, ["host", "viewer"]);

    let viewer_media = SharedMedia::paused_at(5.0);
    let mut viewer = PartySession::spawn(
        &base,
        &joined,
        "viewer",
        "Viewer",
        viewer_media.clone(),
        None,
        fast_config(),
    );
    let mut viewer_events = viewer.take_events().unwrap();
    wait_connected(&mut viewer_events).await;

    // The catch-up yanks the viewer to the room's state (0.0, paused):
    // drift 5.0 is over the threshold.
    let catch_up = next_sync_applied(&mut viewer_events).await;
    assert_eq!(catch_up.user_id, "system");
    assert_eq!(viewer_media.current_time(), 0.0);
    assert!(viewer_media.is_paused());

    // Let both settle windows expire before the host acts.
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Host presses play.
    host_media.0.lock().play().unwrap();
    host.notify_transition(SyncAction::Play).await.unwrap();

    let applied = next_sync_applied(&mut viewer_events).await;
    assert_eq!(applied.user_id, "host");
    assert!(applied.is_playing);
    assert!(!viewer_media.is_paused());
    // Drift was zero after the catch-up; no forced seek.
    assert_eq!(viewer_media.current_time(), 0.0);

    // No-echo: the host gets its own event fanned back and must not
    // apply it.
    let echo = timeout(Duration::from_millis(400), async {
        loop {
            if let SessionEvent::SyncApplied(event) = next_event(&mut host_events).await {
                return event;
            }
        }
    })
    .await;
    assert!(echo.is_err(), "host applied its own echo: {echo:?}");
    assert_eq!(host_media.current_time(), 0.0);

    viewer.shutdown().await;
    host.shutdown().await;
}

#[tokio::test]
async fn test_non_host_transitions_are_not_broadcast() {
    let addr = start_server().await;
    let base = format!("http://{addr}");

    let host_api = RoomApi::new(&base, "host");
    let room = host_api.create_room("movie-1").await.unwrap();

    let host_media = SharedMedia::paused_at(0.0);
    let mut host = PartySession::spawn(
        &base,
        &room,
        "host",
        "Host",
        host_media.clone(),
        None,
        fast_config(),
    );
    let mut host_events = host.take_events().unwrap();
    wait_connected(&mut host_events).await;
    next_sync_applied(&mut host_events).await; // catch-up

    let viewer_api = RoomApi::new(&base, "viewer");
    let joined = viewer_api.join_room(&room.room_id).await.unwrap();
    let viewer_media = SharedMedia::paused_at(0.0);
    let mut viewer = PartySession::spawn(
        &base,
        &joined,
        "viewer",
        "Viewer",
        viewer_media.clone(),
        None,
        fast_config(),
    );
    let mut viewer_events = viewer.take_events().unwrap();
    wait_connected(&mut viewer_events).await;
    next_sync_applied(&mut viewer_events).await; // catch-up

    tokio::time::sleep(Duration::from_millis(150)).await;

    // The viewer's local play must not reach the host: the engine
    // refuses to emit for a non-host.
    viewer_media.0.lock().play().unwrap();
    viewer.notify_transition(SyncAction::Play).await.unwrap();

    let leaked = timeout(Duration::from_millis(400), async {
        loop {
            if let SessionEvent::SyncApplied(event) = next_event(&mut host_events).await {
                return event;
            }
        }
    })
    .await;
    assert!(leaked.is_err(), "non-host event reached the host: {leaked:?}");
    assert!(host_media.is_paused());

    viewer.shutdown().await;
    host.shutdown().await;
}

#[tokio::test]
async fn test_room_closed_reaches_viewer_when_host_leaves() {
    let addr = start_server().await;
    let base = format!("http://{addr}");

    let host_api = RoomApi::new(&base, "host");
    let room = host_api.create_room("movie-1").await.unwrap();

    let mut host = PartySession::spawn(
        &base,
        &room,
        "host",
        "Host",
        SharedMedia::paused_at(0.0),
        None,
        fast_config(),
    );
    let mut host_events = host.take_events().unwrap();
    wait_connected(&mut host_events).await;

    let viewer_api = RoomApi::new(&base, "viewer");
    let joined = viewer_api.join_room(&room.room_id).await.unwrap();
    let mut viewer = PartySession::spawn(
        &base,
        &joined,
        "viewer",
        "Viewer",
        SharedMedia::paused_at(0.0),
        None,
        fast_config(),
    );
    let mut viewer_events = viewer.take_events().unwrap();
    wait_connected(&mut viewer_events).await;

    // Host tears down; its transport-level leave closes the room.
    host.shutdown().await;

    loop {
        match next_event(&mut viewer_events).await {
            SessionEvent::RoomClosed { reason } => {
                assert_eq!(reason, "host left");
                break;
            }
            SessionEvent::SyncApplied(_)
            | SessionEvent::Participants(_)
            | SessionEvent::Connected => {}
            other => panic!("unexpected event {other:?}"),
        }
    }

    viewer.shutdown().await;
}

struct ChannelSink(mpsc::UnboundedSender<(f64, f64)>);

impl ProgressSink for ChannelSink {
    fn report(&mut self, position_secs: f64, duration_secs: f64) {
        let _ = self.0.send((position_secs, duration_secs));
    }
}

#[tokio::test]
async fn test_progress_heartbeat_reports_while_playing() {
    // No server needed: the heartbeat runs regardless of transport
    // state. Point the supervisor at a dead address with a long retry
    // delay so it stays quiet.
    let room = RoomSnapshot {
        room_id: "r1".into(),
        movie_id: "movie-1".into(),
        host_user_id: "host".into(),
        participants: vec!["host".into()],
        current_time: 0.0,
        is_playing: false,
    };

    let media = FakeMedia::playing_at(30.0).with_duration(3600.0);
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();

    let config = SessionConfig {
        progress_interval: Duration::from_millis(50),
        supervisor: SupervisorConfig {
            initial_delay: Duration::from_secs(30),
            ..SupervisorConfig::default()
        },
        ..SessionConfig::default()
    };

    let session = PartySession::spawn(
        "http://127.0.0.1:1",
        &room,
        "host",
        "Host",
        media,
        Some(Box::new(ChannelSink(report_tx))),
        config,
    );

    let (position, duration) = timeout(Duration::from_secs(2), report_rx.recv())
        .await
        .expect("no progress report")
        .expect("report channel closed");
    assert_eq!(position, 30.0);
    assert_eq!(duration, 3600.0);

    session.shutdown().await;
}
