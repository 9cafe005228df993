//! Cinesync Core Library
//!
//! The client-side synchronization engine as a pure state machine,
//! plus the media-element abstraction it drives.
//!
//! Nothing in this crate touches the network or a runtime clock: the
//! engine is owned by exactly one driver task, which feeds it remote
//! events, local media transitions, and `Instant`s. That keeps the
//! suppression window single-owner (no shared flag) and makes every
//! correctness property testable headless.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod media;
pub mod test_utils;

pub use engine::{ApplyOutcome, EngineConfig, EngineState, PlaybackChange, SyncEngine};
pub use media::{MediaHandle, PlaybackError};
