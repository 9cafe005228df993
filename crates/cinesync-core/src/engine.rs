//! The playback sync engine.
//!
//! One instance per connected peer. The host's engine turns local media
//! transitions into [`SyncEvent`]s; every engine (host included, via
//! echo discard) applies received events to its local media element
//! with drift correction and emission suppression.

use std::time::{Duration, Instant};

use cinesync_proto::{SyncAction, SyncEvent};

use crate::media::{MediaHandle, PlaybackError};

/// Tunables for drift correction and echo suppression.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Drift below this many seconds is tolerated rather than seeked
    /// over; a seek is a visible hitch and `timeupdate` jitter alone
    /// can produce sub-second drift.
    pub drift_threshold_secs: f64,
    /// How long after applying a remote event local transitions stay
    /// suppressed. Must be at least the relay's typical round trip, or
    /// a correction would re-broadcast itself.
    pub settle_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drift_threshold_secs: 1.0,
            settle_window: Duration::from_millis(500),
        }
    }
}

/// Connection lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disconnected,
    Connecting,
    /// Channel acknowledged; receiving and (if host) emitting.
    Subscribed,
}

/// What applying a remote event did to the local element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackChange {
    Unchanged,
    Started,
    Paused,
    /// `play()` was refused (autoplay policy). Reported, not retried.
    Rejected,
}

/// Result of [`SyncEngine::apply_remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Event carried our own user id; applying it would double-apply.
    EchoDiscarded,
    /// Engine is not subscribed; nothing was touched.
    Ignored,
    Applied {
        sought: bool,
        playback: PlaybackChange,
    },
}

/// Per-peer synchronization engine. Pure data structure: the driver
/// task feeds it events and timestamps, it mutates only its own media
/// handle.
pub struct SyncEngine<M> {
    user_id: String,
    host_user_id: String,
    media: M,
    config: EngineConfig,
    state: EngineState,
    /// While set and in the future, local transitions are echoes of a
    /// remote application and must not be emitted.
    suppress_until: Option<Instant>,
}

impl<M: MediaHandle> SyncEngine<M> {
    pub fn new(
        user_id: impl Into<String>,
        host_user_id: impl Into<String>,
        media: M,
        config: EngineConfig,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            host_user_id: host_user_id.into(),
            media,
            config,
            state: EngineState::Disconnected,
            suppress_until: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_host(&self) -> bool {
        self.user_id == self.host_user_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// `Disconnected → Connecting`. Idempotent while already past
    /// `Disconnected`.
    pub fn begin_connect(&mut self) {
        if self.state == EngineState::Disconnected {
            self.state = EngineState::Connecting;
        }
    }

    /// Channel ack: `Connecting → Subscribed`.
    pub fn on_subscribed(&mut self) {
        self.state = EngineState::Subscribed;
    }

    /// Transport dropped. Suppression dies with the subscription; the
    /// settle window is meaningless across a reconnect.
    pub fn on_disconnected(&mut self) {
        self.state = EngineState::Disconnected;
        self.suppress_until = None;
    }

    /// Whether local transitions are currently echoes of a remote
    /// application.
    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.suppress_until.is_some_and(|deadline| now < deadline)
    }

    /// Clear an expired settle window. Returns true if the engine left
    /// the suppressed state.
    pub fn settle(&mut self, now: Instant) -> bool {
        if self.suppress_until.is_some_and(|deadline| now >= deadline) {
            self.suppress_until = None;
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Emission (host only)
    // ========================================================================

    /// A local media transition (`play`, `pause`, `seeked`) happened.
    /// Returns the event to publish, or `None` when emission is gated.
    ///
    /// Gates, in order: must be subscribed; must be the host (non-hosts
    /// never emit, even if the UI failed to lock their controls); must
    /// not be inside the suppression window (a received correction
    /// re-broadcast is an oscillation).
    pub fn local_transition(&self, action: SyncAction, now: Instant) -> Option<SyncEvent> {
        if self.state != EngineState::Subscribed {
            return None;
        }
        if !self.is_host() {
            tracing::debug!(user_id = %self.user_id, "non-host transition ignored");
            return None;
        }
        if self.is_suppressed(now) {
            return None;
        }

        Some(SyncEvent::new(
            self.user_id.clone(),
            self.media.current_time(),
            !self.media.is_paused(),
            action,
        ))
    }

    // ========================================================================
    // Application (every peer)
    // ========================================================================

    /// Apply a remote sync event to the local media element.
    ///
    /// Time is corrected before play state: seeking while paused is
    /// cheap, while playing first and immediately re-seeking stutters
    /// visibly. Drift at or below the threshold is left alone.
    pub fn apply_remote(&mut self, event: &SyncEvent, now: Instant) -> ApplyOutcome {
        if event.user_id == self.user_id {
            return ApplyOutcome::EchoDiscarded;
        }
        if self.state != EngineState::Subscribed {
            return ApplyOutcome::Ignored;
        }

        // Everything the application triggers on the local element
        // (play/pause/seeked callbacks) must stay un-emitted until the
        // element settles.
        self.suppress_until = Some(now + self.config.settle_window);

        let drift = (self.media.current_time() - event.current_time).abs();
        let sought = drift > self.config.drift_threshold_secs;
        if sought {
            self.media.seek(event.current_time);
            tracing::debug!(
                target_secs = event.current_time,
                drift_secs = drift,
                "corrected playback position"
            );
        }

        let playback = if event.is_playing && self.media.is_paused() {
            match self.media.play() {
                Ok(()) => PlaybackChange::Started,
                Err(PlaybackError::Rejected(reason)) => {
                    tracing::warn!(%reason, "media backend refused play");
                    PlaybackChange::Rejected
                }
            }
        } else if !event.is_playing && !self.media.is_paused() {
            self.media.pause();
            PlaybackChange::Paused
        } else {
            PlaybackChange::Unchanged
        };

        ApplyOutcome::Applied { sought, playback }
    }
}
