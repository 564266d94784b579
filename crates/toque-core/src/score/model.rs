//! The score data model.
//!
//! A [`Toque`] is one rhythm piece: an ordered list of [`Section`]s,
//! each of which repeats its measure sequence a configured number of
//! times before playback moves on. The model is data only; loading,
//! editing, and validating it are the host's job. The scheduler treats
//! it as read-mostly and tolerates concurrent edits by re-deriving
//! everything it needs from the model on every scheduled step.

/// A single stroke slot within a track's step grid.
///
/// Strokes are instrument-specific letter codes ('O' open, 'S' slap,
/// 'B' bass, ...). Which codes are valid for which instrument is an
/// editing-time concern; the scheduler emits whatever it finds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stroke {
    /// A rest. Never triggers a sound.
    Rest,
    /// A sounding stroke identified by its letter code.
    Hit(char),
}

impl Stroke {
    /// Code used for rests in the original single-character encoding.
    pub const REST_CODE: char = '.';

    /// Parse a stroke from its single-character code.
    pub fn from_code(code: char) -> Self {
        if code == Self::REST_CODE {
            Stroke::Rest
        } else {
            Stroke::Hit(code)
        }
    }

    /// The single-character code for this stroke.
    pub fn code(&self) -> char {
        match self {
            Stroke::Rest => Self::REST_CODE,
            Stroke::Hit(c) => *c,
        }
    }

    /// Check whether this stroke is a rest.
    pub fn is_rest(&self) -> bool {
        matches!(self, Stroke::Rest)
    }
}

/// One instrument row within a measure.
///
/// `strokes` has one slot per step of the owning section. The editor is
/// responsible for keeping the two in sync; the scheduler treats any
/// out-of-range step as a rest.
#[derive(Clone, Debug)]
pub struct Track {
    /// Identifier of the instrument playing this row (e.g. "IYA").
    pub instrument: String,
    /// Playback volume, 0.0 to 1.0.
    pub volume: f32,
    /// Muted tracks never emit trigger events.
    pub muted: bool,
    /// One stroke per step.
    pub strokes: Vec<Stroke>,
}

impl Track {
    /// Create an unmuted track at full volume with all-rest strokes.
    pub fn new(instrument: impl Into<String>, steps: usize) -> Self {
        Self {
            instrument: instrument.into(),
            volume: 1.0,
            muted: false,
            strokes: vec![Stroke::Rest; steps],
        }
    }

    /// Set the stroke row from a string of single-character codes.
    pub fn with_strokes(mut self, codes: &str) -> Self {
        self.strokes = codes.chars().map(Stroke::from_code).collect();
        self
    }

    /// Set the volume.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Set the muted flag.
    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

/// One measure: an ordered list of instrument tracks.
#[derive(Clone, Debug, Default)]
pub struct Measure {
    /// Tracks in display order. Trigger events preserve this order.
    pub tracks: Vec<Track>,
}

impl Measure {
    /// Create an empty measure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track to the measure.
    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }
}

/// A section of a toque: a measure sequence with its own step grid,
/// repeat count, and tempo rules.
#[derive(Clone, Debug)]
pub struct Section {
    /// Stable identifier. Playback tracks sections by id, not index,
    /// so the editor can reorder or delete sections mid-playback.
    pub id: String,
    /// Display name. Unused by the scheduler.
    pub name: String,
    /// Steps per measure.
    pub steps: usize,
    /// Steps per beat. Used only for duration math (4 = sixteenths in
    /// 4/4, 3 = triplet feel). Zero is a fatal configuration error.
    pub subdivision: u32,
    /// Times the measure sequence repeats before advancing.
    pub repetitions: u32,
    /// Section tempo. When absent the toque's global BPM applies.
    pub bpm_override: Option<f64>,
    /// Percent tempo change applied multiplicatively once per
    /// completed repetition pass. May be zero or negative.
    pub tempo_acceleration: f64,
    /// The measure sequence.
    pub measures: Vec<Measure>,
}

impl Section {
    /// Create a section with the given id and step grid, one implicit
    /// repetition, no override, and no acceleration.
    pub fn new(id: impl Into<String>, steps: usize) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            steps,
            subdivision: 4,
            repetitions: 1,
            bpm_override: None,
            tempo_acceleration: 0.0,
            measures: Vec::new(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the subdivision (steps per beat).
    pub fn with_subdivision(mut self, subdivision: u32) -> Self {
        self.subdivision = subdivision;
        self
    }

    /// Set the repeat count.
    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Set a section-local BPM override.
    pub fn with_bpm_override(mut self, bpm: f64) -> Self {
        self.bpm_override = Some(bpm);
        self
    }

    /// Set the per-repetition tempo acceleration in percent.
    pub fn with_tempo_acceleration(mut self, percent: f64) -> Self {
        self.tempo_acceleration = percent;
        self
    }

    /// Add a measure to the sequence.
    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    /// Repeat count, defensively treating 0 as 1.
    pub fn repetition_count(&self) -> u32 {
        self.repetitions.max(1)
    }
}

/// A complete rhythm piece: global tempo plus an ordered section list.
#[derive(Clone, Debug)]
pub struct Toque {
    /// Tempo applied to sections without an override.
    pub global_bpm: f64,
    /// Sections in playback order. Playback wraps from the last
    /// section back to the first.
    pub sections: Vec<Section>,
}

impl Toque {
    /// Create a toque with the given global BPM and no sections.
    pub fn new(global_bpm: f64) -> Self {
        Self {
            global_bpm,
            sections: Vec::new(),
        }
    }

    /// Add a section.
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Find a section's index by id.
    ///
    /// Playback re-derives the active index through this lookup on
    /// every step so that reordering or deleting sections mid-playback
    /// is observed immediately.
    pub fn section_index(&self, id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    /// Get a section by id.
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Get a section by id, mutably.
    pub fn section_mut(&mut self, id: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.id == id)
    }
}

impl Default for Toque {
    fn default() -> Self {
        Self::new(120.0)
    }
}
