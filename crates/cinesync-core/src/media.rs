//! Media element abstraction.

/// Starting playback failed.
///
/// The canonical case is a browser-style autoplay policy rejecting an
/// unattended `play()`. This is reported to the user once, never
/// retried automatically, and never crashes the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback start rejected by the media backend: {0}")]
    Rejected(String),
}

/// The local video element as the engine sees it.
///
/// The engine holds the only handle to its media element; every other
/// peer influences it exclusively through advisory sync events. `play`
/// is fallible, `pause` and `seek` are not; that asymmetry is the
/// media platform's, not ours.
pub trait MediaHandle {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Jump to an absolute position in seconds.
    fn seek(&mut self, position_secs: f64);

    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Total duration in seconds, if the media has loaded far enough
    /// to know it. Used by the progress heartbeat.
    fn duration(&self) -> Option<f64> {
        None
    }
}
