//! Scripted media element for engine and session tests.

use crate::media::{MediaHandle, PlaybackError};

/// A call the engine made against the fake element, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCall {
    Seek(f64),
    Play,
    Pause,
}

/// In-memory [`MediaHandle`] that records every call.
#[derive(Debug, Default)]
pub struct FakeMedia {
    position: f64,
    paused: bool,
    duration: Option<f64>,
    reject_play: Option<String>,
    calls: Vec<MediaCall>,
}

impl FakeMedia {
    pub fn paused_at(position_secs: f64) -> Self {
        Self {
            position: position_secs,
            paused: true,
            ..Self::default()
        }
    }

    pub fn playing_at(position_secs: f64) -> Self {
        Self {
            position: position_secs,
            paused: false,
            ..Self::default()
        }
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration = Some(duration_secs);
        self
    }

    /// Make every subsequent `play()` fail, autoplay-policy style.
    pub fn reject_play(&mut self, reason: impl Into<String>) {
        self.reject_play = Some(reason.into());
    }

    pub fn calls(&self) -> &[MediaCall] {
        &self.calls
    }

    /// Simulate playback advancing without any engine involvement.
    pub fn advance(&mut self, secs: f64) {
        self.position += secs;
    }
}

impl MediaHandle for FakeMedia {
    fn current_time(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, position_secs: f64) {
        self.position = position_secs;
        self.calls.push(MediaCall::Seek(position_secs));
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.calls.push(MediaCall::Play);
        if let Some(reason) = &self.reject_play {
            return Err(PlaybackError::Rejected(reason.clone()));
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
        self.calls.push(MediaCall::Pause);
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}
