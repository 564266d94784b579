//! Trigger event emission.
//!
//! Given a position in the score, [`events_for`] decides which sounds
//! fire on that step. This is the only place mute flags, volumes, and
//! stroke rows are consulted, and it re-reads them from the live score
//! every step, so a mute toggled mid-playback is heard on the very
//! next scheduled step.

use crate::score::{Section, Stroke};

/// One "trigger this sound now" event.
///
/// Events within a step carry no ordering beyond track order; the
/// audio backend must support firing several of them at the same
/// timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerEvent {
    /// Instrument identifier of the emitting track.
    pub instrument: String,
    /// The stroke to play. Never [`Stroke::Rest`].
    pub stroke: Stroke,
    /// Track volume, 0.0 to 1.0.
    pub volume: f32,
}

/// Collect the trigger events for one step of a section.
///
/// Tracks are visited in order. Muted tracks, silent tracks, rests,
/// and steps beyond a track's stroke row are skipped; a measure index
/// beyond the section's measures yields nothing. Both out-of-range
/// cases are expected transients while the editor resizes the score
/// under playback.
pub fn events_for(section: &Section, measure_index: usize, step_index: usize) -> Vec<TriggerEvent> {
    let Some(measure) = section.measures.get(measure_index) else {
        return Vec::new();
    };

    let mut events = Vec::new();
    for track in &measure.tracks {
        if track.muted || track.volume <= 0.0 {
            continue;
        }
        match track.strokes.get(step_index) {
            Some(stroke) if !stroke.is_rest() => events.push(TriggerEvent {
                instrument: track.instrument.clone(),
                stroke: *stroke,
                volume: track.volume,
            }),
            _ => {}
        }
    }
    events
}
