//! Tempo resolution and timing seams.
//!
//! This module provides the pure tempo math and the clock boundary:
//!
//! - [`effective_bpm`] / [`step_duration_seconds`] - tempo resolver
//! - [`SchedulerConfig`] - the exposed lookahead tuning constants
//! - [`AudioClock`] - the time source the scheduler stamps events with
//! - [`SystemClock`] - monotonic default clock

use std::time::{Duration, Instant};

use crate::error::PlaybackError;
use crate::score::Section;

/// Resolve the BPM in effect when entering a section.
///
/// A positive section override wins; otherwise the global BPM applies.
/// This is evaluated only at section-entry and repetition boundaries.
/// Mid-section edits to a field that is not currently live take effect
/// the next time such a boundary is crossed.
pub fn effective_bpm(section: &Section, global_bpm: f64) -> f64 {
    match section.bpm_override {
        Some(bpm) if bpm > 0.0 => bpm,
        _ => global_bpm,
    }
}

/// Duration of one step of `section` at the given playhead BPM.
///
/// `60 / bpm` seconds per beat, divided by the section's steps per
/// beat. A non-positive BPM or a zero subdivision is a fatal
/// configuration error; clamping here would mask authoring mistakes.
pub fn step_duration_seconds(section: &Section, playhead_bpm: f64) -> Result<f64, PlaybackError> {
    if playhead_bpm <= 0.0 {
        return Err(PlaybackError::InvalidBpm { bpm: playhead_bpm });
    }
    if section.subdivision == 0 {
        return Err(PlaybackError::InvalidSubdivision {
            subdivision: section.subdivision,
        });
    }
    let seconds_per_beat = 60.0 / playhead_bpm;
    Ok(seconds_per_beat / section.subdivision as f64)
}

/// Lookahead tuning constants.
///
/// `schedule_ahead_seconds` is how far events are stamped in advance of
/// the clock; `lookahead_interval` is the wake-up cadence of the
/// schedule loop. The former must exceed the latter by a safe margin
/// (4x by default) so the event queue never runs dry between wake-ups.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// How far ahead of the clock events are scheduled, in seconds.
    pub schedule_ahead_seconds: f64,
    /// How often the schedule loop wakes up.
    pub lookahead_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_ahead_seconds: 0.1,
            lookahead_interval: Duration::from_millis(25),
        }
    }
}

/// Monotonic time source the scheduler stamps events against.
///
/// The wake-up timer driving the schedule loop is imprecise; this
/// clock is not. Every trigger is stamped with an absolute time read
/// from the same clock the audio backend plays against, which is what
/// keeps long-run playback drift-free.
pub trait AudioClock: Send {
    /// Current time in seconds. Monotonic, not necessarily wall-clock.
    fn now(&self) -> f64;
}

/// Default clock anchored on [`Instant`] at construction.
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose zero point is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}
