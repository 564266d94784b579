//! Shared handle for the score.
//!
//! The [`ScoreManager`] wraps the [`Toque`] in an `Arc<RwLock>` so the
//! editor can keep mutating the score while the scheduler reads it.
//! The scheduler takes a fresh read for every step it stamps, so live
//! edits (mute toggles, tempo changes, section deletion) are observed
//! on the very next scheduled step and never torn mid-step.

use std::sync::{Arc, RwLock};

use super::model::Toque;

/// Clone-shared, read-mostly access to the score.
#[derive(Clone)]
pub struct ScoreManager {
    score: Arc<RwLock<Toque>>,
}

impl Default for ScoreManager {
    fn default() -> Self {
        Self::new(Toque::default())
    }
}

impl ScoreManager {
    /// Create a manager owning the given score.
    pub fn new(score: Toque) -> Self {
        Self {
            score: Arc::new(RwLock::new(score)),
        }
    }

    /// Read the score with a closure.
    ///
    /// Multiple readers can hold the lock simultaneously.
    pub fn with_score_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Toque) -> R,
    {
        let score = self.score.read().expect("Score lock poisoned");
        f(&score)
    }

    /// Write to the score with a closure.
    ///
    /// This acquires an exclusive write lock for the duration of the
    /// closure. Structural edits go through here; the scheduler itself
    /// never writes.
    pub fn with_score_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Toque) -> R,
    {
        let mut score = self.score.write().expect("Score lock poisoned");
        f(&mut score)
    }

    /// Get a clone of the current score.
    pub fn snapshot(&self) -> Toque {
        self.with_score_read(|s| s.clone())
    }

    /// Get the global BPM.
    pub fn global_bpm(&self) -> f64 {
        self.with_score_read(|s| s.global_bpm)
    }

    /// Get the number of sections.
    pub fn section_count(&self) -> usize {
        self.with_score_read(|s| s.sections.len())
    }
}

impl std::fmt::Debug for ScoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreManager")
            .field("sections", &self.section_count())
            .finish_non_exhaustive()
    }
}
