//! Error types for playback.

use thiserror::Error;

/// Errors surfaced by the playback engine.
///
/// Configuration errors are fatal: the scheduler stops the transport
/// rather than divide by zero or silently clamp an authoring mistake.
/// Trigger errors are per-event and never halt the schedule loop.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// A resolved BPM was zero or negative.
    #[error("invalid BPM {bpm}: tempo must be greater than zero")]
    InvalidBpm { bpm: f64 },

    /// A section's subdivision was zero.
    #[error("invalid subdivision {subdivision}: steps per beat must be at least 1")]
    InvalidSubdivision { subdivision: u32 },

    /// The audio trigger sink rejected a scheduled event.
    #[error("trigger rejected: {message}")]
    Trigger { message: String },
}

impl PlaybackError {
    /// Whether this error must stop the transport.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidBpm { .. } | PlaybackError::InvalidSubdivision { .. }
        )
    }
}
