//! Watch-party session driver.
//!
//! A [`PartySession`] owns one sync engine and one connection
//! supervisor, and is the single task that ever touches either. Local
//! media transitions come in as commands, remote events arrive from
//! the transport, and the application observes the session through an
//! event stream. All timers (settle window, progress heartbeat) are
//! locals of the driver task, so leaving the room cancels them by
//! construction.

use std::time::{Duration, Instant};

use cinesync_core::engine::{ApplyOutcome, EngineConfig, PlaybackChange, SyncEngine};
use cinesync_core::media::MediaHandle;
use cinesync_proto::rest::RoomSnapshot;
use cinesync_proto::{ClientMessage, PresenceUpdate, ServerMessage, SyncAction, SyncEvent};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::ClientError;
use crate::supervisor::{ConnectionSupervisor, SupervisorConfig, SupervisorHandle, TransportEvent};

/// Receives playback progress while the media is playing. Watch
/// history persistence hangs off this seam; persistence itself is an
/// external concern.
pub trait ProgressSink: Send + 'static {
    fn report(&mut self, position_secs: f64, duration_secs: f64);
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub engine: EngineConfig,
    pub supervisor: SupervisorConfig,
    /// How often playback progress is reported while playing.
    pub progress_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            supervisor: SupervisorConfig::default(),
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// What the application sees of the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect attempts exhausted; the session is over.
    ConnectionFailed,
    /// A remote sync event was applied to the local media element.
    SyncApplied(SyncEvent),
    Participants(PresenceUpdate),
    RoomClosed { reason: String },
    /// The relay refused or flagged something we sent.
    RelayError { message: String },
    /// The media backend refused `play()` (autoplay policy). Emitted
    /// once per session; the user has to interact with the page.
    PlaybackBlocked,
}

enum Command {
    LocalTransition(SyncAction),
    Shutdown,
}

/// Entry point: spawns the driver task for one room membership.
pub struct PartySession;

impl PartySession {
    /// Spawn a session for `user_id` in `room`. The media element is
    /// moved into the engine; the returned handle is the only way to
    /// reach it.
    pub fn spawn<M: MediaHandle + Send + 'static>(
        server_url: &str,
        room: &RoomSnapshot,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        media: M,
        progress: Option<Box<dyn ProgressSink>>,
        config: SessionConfig,
    ) -> SessionHandle {
        let user_id = user_id.into();
        let mut engine = SyncEngine::new(
            user_id.clone(),
            room.host_user_id.clone(),
            media,
            config.engine.clone(),
        );
        engine.begin_connect();

        let (supervisor_handle, transport_rx) = ConnectionSupervisor::new(
            server_url,
            &room.room_id,
            user_id,
            user_name.into(),
            config.supervisor.clone(),
        )
        .spawn();

        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(256);

        let task = tokio::spawn(drive(
            engine,
            supervisor_handle,
            transport_rx,
            command_rx,
            event_tx,
            progress,
            config,
        ));

        SessionHandle {
            commands: command_tx,
            events: Some(event_rx),
            task,
        }
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: Option<mpsc::Receiver<SessionEvent>>,
    task: tokio::task::JoinHandle<()>,
}

impl SessionHandle {
    /// The local media element transitioned (`play`, `pause`,
    /// `seeked`). The engine decides whether anything is emitted.
    pub async fn notify_transition(&self, action: SyncAction) -> Result<(), ClientError> {
        self.commands
            .send(Command::LocalTransition(action))
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Take the event receiver (can only be taken once).
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events.take()
    }

    /// Leave the room and tear the session down. The transport-level
    /// leave goes out even if the join never completed.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        let _ = self.task.await;
    }
}

#[allow(clippy::too_many_lines)]
async fn drive<M: MediaHandle>(
    mut engine: SyncEngine<M>,
    supervisor: SupervisorHandle,
    mut transport_rx: mpsc::Receiver<TransportEvent>,
    mut command_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<SessionEvent>,
    mut progress: Option<Box<dyn ProgressSink>>,
    config: SessionConfig,
) {
    let mut settle_at: Option<tokio::time::Instant> = None;
    let mut playback_blocked_reported = false;

    let mut progress_timer = tokio::time::interval(config.progress_interval);
    progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // Copied out so the settle future does not hold a borrow while
        // other arms reassign the deadline.
        let settle_deadline = settle_at;

        tokio::select! {
            command = command_rx.recv() => match command {
                Some(Command::LocalTransition(action)) => {
                    if let Some(event) = engine.local_transition(action, Instant::now()) {
                        if supervisor
                            .publish(ClientMessage::Sync(event))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
                Some(Command::Shutdown) | None => break,
            },

            transport = transport_rx.recv() => match transport {
                Some(TransportEvent::Connected) => {
                    engine.on_subscribed();
                    let _ = event_tx.send(SessionEvent::Connected).await;
                }
                Some(TransportEvent::Reconnecting { attempt, delay }) => {
                    engine.on_disconnected();
                    engine.begin_connect();
                    settle_at = None;
                    let _ = event_tx
                        .send(SessionEvent::Reconnecting { attempt, delay })
                        .await;
                }
                Some(TransportEvent::Failed) => {
                    engine.on_disconnected();
                    let _ = event_tx.send(SessionEvent::ConnectionFailed).await;
                    break;
                }
                Some(TransportEvent::Message(message)) => match message {
                    ServerMessage::Sync(event) => {
                        let outcome = engine.apply_remote(&event, Instant::now());
                        if let ApplyOutcome::Applied { playback, .. } = outcome {
                            settle_at = Some(
                                tokio::time::Instant::now() + config.engine.settle_window,
                            );
                            if playback == PlaybackChange::Rejected
                                && !playback_blocked_reported
                            {
                                playback_blocked_reported = true;
                                let _ = event_tx.send(SessionEvent::PlaybackBlocked).await;
                            }
                            let _ = event_tx.send(SessionEvent::SyncApplied(event)).await;
                        }
                    }
                    ServerMessage::Participants(update) => {
                        let _ = event_tx.send(SessionEvent::Participants(update)).await;
                    }
                    ServerMessage::RoomClosed { reason } => {
                        let _ = event_tx.send(SessionEvent::RoomClosed { reason }).await;
                        break;
                    }
                    ServerMessage::Error { message } => {
                        tracing::warn!(%message, "relay reported an error");
                        let _ = event_tx.send(SessionEvent::RelayError { message }).await;
                    }
                },
                None => break,
            },

            () = async move {
                match settle_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                engine.settle(Instant::now());
                settle_at = None;
            },

            _ = progress_timer.tick() => {
                if let Some(sink) = progress.as_mut() {
                    let media = engine.media();
                    if !media.is_paused()
                        && let Some(duration) = media.duration()
                    {
                        sink.report(media.current_time(), duration);
                    }
                }
            },
        }
    }

    // Teardown: the leave goes out through the supervisor, and every
    // timer above dies with this task.
    supervisor.shutdown().await;
}
