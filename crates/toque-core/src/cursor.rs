//! Playback position tracking.
//!
//! The [`PositionCursor`] is the mutable "where are we" of playback:
//! active section (by id), measure, step, repetition pass, and the
//! live playhead BPM, which diverges from the written tempo under
//! per-repetition acceleration. Advancing it is a pure state
//! transition against the current score; it performs no I/O and never
//! fails, even when the score changed under it.

use crate::score::Toque;
use crate::timing::effective_bpm;

/// What an [`PositionCursor::advance`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Advance {
    /// The cursor entered a different section (or re-entered the only
    /// one; wrapping a single section back onto itself counts).
    pub section_changed: bool,
    /// The playhead BPM changed (acceleration or section entry).
    pub tempo_changed: bool,
    /// The cursor moved past the last repetition of the last section.
    /// With looping disabled this is the end of playback.
    pub wrapped: bool,
}

/// Mutable playback position.
#[derive(Clone, Debug)]
pub struct PositionCursor {
    /// Id of the section being played. `None` until the first reset,
    /// or when the score has no sections.
    pub active_section_id: Option<String>,
    /// 0-based index into the section's measure sequence.
    pub measure_index: usize,
    /// 0-based step within the measure.
    pub step_index: usize,
    /// 1-based pass through the section's measure sequence.
    pub repetition_counter: u32,
    /// Live tempo. Starts at the section's effective BPM and compounds
    /// under acceleration until the next section boundary.
    pub playhead_bpm: f64,
}

impl PositionCursor {
    /// Create a cursor positioned at nothing in particular.
    ///
    /// Call [`reset`](Self::reset) before playback.
    pub fn new() -> Self {
        Self {
            active_section_id: None,
            measure_index: 0,
            step_index: 0,
            repetition_counter: 1,
            playhead_bpm: 0.0,
        }
    }

    /// Reset to the start of the first section.
    pub fn reset(&mut self, toque: &Toque) {
        self.measure_index = 0;
        self.step_index = 0;
        self.repetition_counter = 1;
        match toque.sections.first() {
            Some(first) => {
                self.active_section_id = Some(first.id.clone());
                self.playhead_bpm = effective_bpm(first, toque.global_bpm);
            }
            None => {
                self.active_section_id = None;
                self.playhead_bpm = toque.global_bpm;
            }
        }
    }

    /// Resolve the active section's index in the current score.
    ///
    /// A dangling or missing id resolves to index 0: edits racing with
    /// playback are supported, so a deleted section is recovered from,
    /// never thrown on.
    pub fn resolve_index(&self, toque: &Toque) -> usize {
        self.active_section_id
            .as_deref()
            .and_then(|id| toque.section_index(id))
            .unwrap_or(0)
    }

    /// Advance one step.
    ///
    /// Order of checks: next step in the measure, next measure in the
    /// pass, next repetition pass (applying tempo acceleration), next
    /// section (wrapping modulo the section count and re-resolving the
    /// effective BPM).
    pub fn advance(&mut self, toque: &Toque) -> Advance {
        let out = Advance::default();
        if toque.sections.is_empty() {
            return out;
        }
        let index = self.resolve_index(toque);
        let section = &toque.sections[index];

        self.step_index += 1;
        if self.step_index < section.steps {
            return out;
        }
        self.step_index = 0;
        self.measure_index += 1;
        if self.measure_index < section.measures.len() {
            return out;
        }
        self.measure_index = 0;

        if self.repetition_counter < section.repetition_count() {
            self.repetition_counter += 1;
            let tempo_changed = section.tempo_acceleration != 0.0;
            if tempo_changed {
                self.playhead_bpm *= 1.0 + section.tempo_acceleration / 100.0;
            }
            return Advance {
                tempo_changed,
                ..Advance::default()
            };
        }

        self.enter_section((index + 1) % toque.sections.len(), index, toque)
    }

    /// Leave the current section without playing it out.
    ///
    /// Used when the active section has no measures: it consumes no
    /// time, so the scheduler treats it as already exhausted and jumps
    /// straight to the next section.
    pub fn skip_exhausted_section(&mut self, toque: &Toque) -> Advance {
        if toque.sections.is_empty() {
            return Advance::default();
        }
        let index = self.resolve_index(toque);
        self.step_index = 0;
        self.measure_index = 0;
        self.enter_section((index + 1) % toque.sections.len(), index, toque)
    }

    fn enter_section(&mut self, next: usize, previous: usize, toque: &Toque) -> Advance {
        let target = &toque.sections[next];
        self.active_section_id = Some(target.id.clone());
        self.repetition_counter = 1;
        let bpm = effective_bpm(target, toque.global_bpm);
        let tempo_changed = (bpm - self.playhead_bpm).abs() > f64::EPSILON;
        self.playhead_bpm = bpm;
        Advance {
            section_changed: true,
            tempo_changed,
            wrapped: previous + 1 == toque.sections.len(),
        }
    }
}

impl Default for PositionCursor {
    fn default() -> Self {
        Self::new()
    }
}
