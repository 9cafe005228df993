//! Connection supervision for the room relay.
//!
//! Owns the WebSocket lifecycle: connect, announce presence, pump
//! frames, and on any drop re-establish the transport with capped
//! exponential backoff. Re-announcing `Join` after every reconnect is a
//! correctness requirement: a silently re-established transport that
//! never resubscribes looks connected while receiving nothing.

use std::sync::Arc;
use std::time::Duration;

use cinesync_proto::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reconnect policy.
///
/// The default starts at the classic 5 s fixed delay and doubles up to
/// the cap. `max_attempts: None` retries forever (surfaced to the user
/// only as a reconnecting indicator); set a limit to get a terminal
/// [`ConnectionState::Failed`] instead.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

/// Transport lifecycle as observed by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Retries exhausted; the supervisor has given up.
    Failed,
}

/// Events the supervisor task emits to its owner.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Transport established and presence re-announced.
    Connected,
    Message(ServerMessage),
    Reconnecting { attempt: u32, delay: Duration },
    Failed,
}

enum Outbound {
    Frame(ClientMessage),
    Shutdown,
}

enum ConnectionEnd {
    Dropped,
    Shutdown,
}

/// Builder for the supervisor task.
pub struct ConnectionSupervisor {
    ws_url: String,
    user_id: String,
    user_name: String,
    config: SupervisorConfig,
}

impl ConnectionSupervisor {
    /// `server_url` without a trailing slash, e.g.
    /// `http://localhost:3000`; the relay endpoint is derived from it.
    pub fn new(
        server_url: &str,
        room_id: &str,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        config: SupervisorConfig,
    ) -> Self {
        let ws_base = server_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        Self {
            ws_url: format!("{ws_base}/ws/{room_id}"),
            user_id: user_id.into(),
            user_name: user_name.into(),
            config,
        }
    }

    /// Spawn the supervision task. The handle is the only way to talk
    /// to the transport; the receiver carries its lifecycle events.
    pub fn spawn(self) -> (SupervisorHandle, mpsc::Receiver<TransportEvent>) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(256);
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));

        let task_state = state.clone();
        let task = tokio::spawn(run(self, outgoing_rx, event_tx, task_state));

        let handle = SupervisorHandle {
            outgoing: outgoing_tx,
            state,
            task,
        };
        (handle, event_rx)
    }
}

/// Handle to a running supervisor task.
pub struct SupervisorHandle {
    outgoing: mpsc::Sender<Outbound>,
    state: Arc<RwLock<ConnectionState>>,
    task: tokio::task::JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Queue a message for the relay. Fails only once the supervisor
    /// has shut down; while reconnecting, messages wait in the queue.
    pub async fn publish(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.outgoing
            .send(Outbound::Frame(message))
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Tear the connection down. A `Leave` is sent on a best-effort
    /// basis before the socket closes, even if the join never
    /// completed.
    pub async fn shutdown(self) {
        let _ = self.outgoing.send(Outbound::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Delay before reconnect `attempt` (1-based): exponential from the
/// initial delay, capped, plus up to 10% jitter.
fn backoff_delay(config: &SupervisorConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let base = config
        .initial_delay
        .saturating_mul(2u32.saturating_pow(exp))
        .min(config.max_delay);
    let jitter_ms = rand::rng().random_range(0..=base.as_millis() as u64 / 10);
    base + Duration::from_millis(jitter_ms)
}

async fn run(
    supervisor: ConnectionSupervisor,
    mut outgoing_rx: mpsc::Receiver<Outbound>,
    event_tx: mpsc::Sender<TransportEvent>,
    state: Arc<RwLock<ConnectionState>>,
) {
    let mut attempt: u32 = 0;

    loop {
        match tokio_tungstenite::connect_async(&supervisor.ws_url).await {
            Ok((mut ws, _)) => {
                attempt = 0;

                // Announce (or re-announce) presence before anything
                // else; the server binds this connection to the user
                // and replies with the current room state.
                let join = ClientMessage::Join {
                    user_id: supervisor.user_id.clone(),
                    user_name: supervisor.user_name.clone(),
                };
                let announced = match join.encode() {
                    Ok(frame) => ws.send(Message::Text(frame.into())).await.is_ok(),
                    Err(err) => {
                        tracing::error!(%err, "failed to encode join announce");
                        false
                    }
                };

                if announced {
                    *state.write() = ConnectionState::Connected;
                    let _ = event_tx.send(TransportEvent::Connected).await;

                    match pump(&supervisor, ws, &mut outgoing_rx, &event_tx).await {
                        ConnectionEnd::Shutdown => {
                            *state.write() = ConnectionState::Disconnected;
                            return;
                        }
                        ConnectionEnd::Dropped => {}
                    }
                } else {
                    tracing::debug!("connection lost during join announce");
                }
            }
            Err(err) => {
                tracing::debug!(%err, "relay connect failed");
            }
        }

        attempt += 1;
        if let Some(max) = supervisor.config.max_attempts
            && attempt > max
        {
            tracing::warn!(attempts = attempt - 1, "giving up on relay reconnect");
            *state.write() = ConnectionState::Failed;
            let _ = event_tx.send(TransportEvent::Failed).await;
            return;
        }

        let delay = backoff_delay(&supervisor.config, attempt);
        *state.write() = ConnectionState::Reconnecting;
        let _ = event_tx
            .send(TransportEvent::Reconnecting { attempt, delay })
            .await;
        tracing::info!(attempt, ?delay, "reconnecting to relay");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            out = drain_for_shutdown(&mut outgoing_rx) => {
                if out {
                    *state.write() = ConnectionState::Disconnected;
                    return;
                }
            }
        }
    }
}

/// While waiting out a backoff delay, keep consuming the outgoing
/// queue; frames published during an outage are dropped (the relay
/// holds no state for us to resume), but a shutdown must still be
/// honored promptly. Returns true on shutdown.
async fn drain_for_shutdown(outgoing_rx: &mut mpsc::Receiver<Outbound>) -> bool {
    loop {
        match outgoing_rx.recv().await {
            Some(Outbound::Shutdown) | None => return true,
            Some(Outbound::Frame(_)) => {
                tracing::debug!("dropped outgoing frame while disconnected");
            }
        }
    }
}

/// Pump one established connection until it drops or shutdown.
async fn pump(
    supervisor: &ConnectionSupervisor,
    ws: Ws,
    outgoing_rx: &mut mpsc::Receiver<Outbound>,
    event_tx: &mpsc::Sender<TransportEvent>,
) -> ConnectionEnd {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            out = outgoing_rx.recv() => match out {
                Some(Outbound::Frame(message)) => {
                    let Ok(frame) = message.encode() else { continue };
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        return ConnectionEnd::Dropped;
                    }
                }
                Some(Outbound::Shutdown) | None => {
                    // Unconditional leave on teardown, even if the
                    // join was never acknowledged.
                    let leave = ClientMessage::Leave {
                        user_id: supervisor.user_id.clone(),
                    };
                    if let Ok(frame) = leave.encode() {
                        let _ = sink.send(Message::Text(frame.into())).await;
                    }
                    let _ = sink.close().await;
                    return ConnectionEnd::Shutdown;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerMessage::decode(text.as_str()) {
                    Ok(message) => {
                        let _ = event_tx.send(TransportEvent::Message(message)).await;
                    }
                    Err(err) => {
                        tracing::warn!(%err, "dropped malformed server frame");
                    }
                },
                Some(Ok(Message::Close(_))) | None => return ConnectionEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(%err, "websocket receive error");
                    return ConnectionEnd::Dropped;
                }
            },
        }
    }
}
