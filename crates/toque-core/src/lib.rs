//! Toque Core - playback scheduling engine for hierarchical percussion
//! scores.
//!
//! This crate provides the building blocks for playing back a toque
//! (sections → measures → tracks → strokes) with drift-free timing:
//!
//! - **Score** - the hierarchical score model and its shared handle
//! - **Timing** - tempo resolution, step durations, the audio clock seam
//! - **Cursor** - the mutable playback position and its advance rules
//! - **Events** - per-step trigger emission (mute/rest/volume aware)
//! - **Scheduler** - the lookahead loop stamping absolute timestamps
//! - **Runtime** - a driver thread with a message-based control surface
//!
//! # Architecture
//!
//! The scheduler never caches score state across wake-ups: the active
//! section is re-derived by id and track flags are re-read for every
//! step it stamps, so the editor may keep mutating the score during
//! playback. Event timestamps are accumulated from exact step
//! durations against an [`AudioClock`], never from "now", which keeps
//! long-run playback drift-free under an imprecise wake-up timer.

pub mod cursor;
pub mod error;
pub mod events;
pub mod runtime;
pub mod scheduler;
pub mod score;
pub mod timing;

// Re-export main types for convenience
pub use cursor::{Advance, PositionCursor};
pub use error::PlaybackError;
pub use events::{events_for, TriggerEvent};
pub use runtime::{ControlMessage, Runtime, RuntimeHandle};
pub use scheduler::{PlaybackObserver, PlaybackScheduler, TransportState, TriggerSink};
pub use score::{Measure, ScoreManager, Section, Stroke, Toque, Track};
pub use timing::{
    effective_bpm, step_duration_seconds, AudioClock, SchedulerConfig, SystemClock,
};
