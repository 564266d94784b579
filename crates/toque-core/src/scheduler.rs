//! Lookahead playback scheduler.
//!
//! The scheduler walks the score and stamps trigger events with
//! absolute clock timestamps inside a small lookahead window. The
//! wake-up cadence driving [`PlaybackScheduler::tick`] is allowed to
//! be sloppy; timestamps are accumulated from exact step durations and
//! never re-read "now", which is what keeps long-run playback
//! drift-free under host scheduling jitter.
//!
//! External seams, per the host contract:
//!
//! - [`AudioClock`](crate::timing::AudioClock) - the time source
//! - [`TriggerSink`] - the audio backend receiving stamped triggers
//! - [`PlaybackObserver`] - position/section/end/error notifications

use crate::cursor::PositionCursor;
use crate::error::PlaybackError;
use crate::events::events_for;
use crate::score::{ScoreManager, Stroke, Toque};
use crate::timing::{step_duration_seconds, AudioClock, SchedulerConfig};

/// Receives stamped trigger events.
///
/// `at_seconds` is an absolute time on the scheduler's clock, always
/// at or ahead of `now`. Several triggers may share one timestamp.
pub trait TriggerSink: Send {
    /// Schedule one stroke to sound at the given time.
    ///
    /// A rejection is reported upward per-event and does not halt the
    /// schedule loop; one missed note must not derail timing.
    fn trigger_at(
        &self,
        instrument: &str,
        stroke: Stroke,
        volume: f32,
        at_seconds: f64,
    ) -> Result<(), PlaybackError>;

    /// Schedule a count-in click. Backends without a click sound can
    /// ignore this.
    fn click_at(&self, accent: bool, at_seconds: f64) {
        let _ = (accent, at_seconds);
    }
}

/// Receives playback notifications.
///
/// Notifications arrive in scheduling order, ahead of audible time;
/// they exist for visual feedback and carry no hard timing contract.
pub trait PlaybackObserver: Send {
    /// A step was scheduled.
    fn on_step(&self, section_id: &str, measure_index: usize, step_index: usize, repetition: u32) {
        let _ = (section_id, measure_index, step_index, repetition);
    }

    /// Playback entered a different section.
    fn on_section_changed(&self, section_id: &str) {
        let _ = section_id;
    }

    /// Looping is disabled and the last repetition of the last section
    /// completed, or the score became unplayable.
    fn on_ended(&self) {}

    /// An error occurred. Fatal configuration errors stop the
    /// transport; trigger rejections do not.
    fn on_error(&self, error: &PlaybackError) {
        let _ = error;
    }
}

/// Transport state of the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportState {
    /// Not playing; position is at the start.
    #[default]
    Stopped,
    /// Pre-roll clicks are sounding; the first step is already anchored.
    CountingIn,
    /// Steps are being scheduled.
    Playing,
    /// Not playing; position is wherever playback halted.
    Paused,
}

impl TransportState {
    /// Whether the schedule loop is live (includes the pre-roll).
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing | TransportState::CountingIn)
    }
}

enum StepOutcome {
    Scheduled,
    Skipped,
    Halted,
}

/// The playback engine.
///
/// Owns the position cursor and the lookahead anchor; shares the score
/// with the editor through a [`ScoreManager`] and re-reads it for
/// every step it stamps, so concurrent edits are observed on the next
/// scheduled step.
pub struct PlaybackScheduler {
    score: ScoreManager,
    config: SchedulerConfig,
    clock: Box<dyn AudioClock>,
    sink: Box<dyn TriggerSink>,
    observer: Box<dyn PlaybackObserver>,
    cursor: PositionCursor,
    state: TransportState,
    /// Absolute timestamp of the next unscheduled step.
    next_event_time: f64,
    /// Clock time at which the pre-roll ends.
    count_in_until: f64,
    loop_enabled: bool,
    count_in_enabled: bool,
}

impl PlaybackScheduler {
    /// Create a scheduler over the given score and seams.
    pub fn new(
        score: ScoreManager,
        clock: impl AudioClock + 'static,
        sink: impl TriggerSink + 'static,
        observer: impl PlaybackObserver + 'static,
    ) -> Self {
        Self {
            score,
            config: SchedulerConfig::default(),
            clock: Box::new(clock),
            sink: Box::new(sink),
            observer: Box::new(observer),
            cursor: PositionCursor::new(),
            state: TransportState::Stopped,
            next_event_time: 0.0,
            count_in_until: 0.0,
            loop_enabled: true,
            count_in_enabled: false,
        }
    }

    /// Override the lookahead tuning.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// The lookahead tuning in effect.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The shared score handle.
    pub fn score(&self) -> &ScoreManager {
        &self.score
    }

    /// Current transport state.
    pub fn transport_state(&self) -> TransportState {
        self.state
    }

    /// Whether the schedule loop is live.
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Current playback position.
    pub fn cursor(&self) -> &PositionCursor {
        &self.cursor
    }

    /// Enable or disable wrap-around looping. When disabled, playback
    /// ends after the last repetition of the last section.
    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    /// Whether wrap-around looping is enabled.
    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    /// Enable or disable the count-in pre-roll on start.
    pub fn set_count_in_enabled(&mut self, enabled: bool) {
        self.count_in_enabled = enabled;
    }

    /// Start or resume playback. No-op while already playing.
    ///
    /// Starting from [`TransportState::Stopped`] resets the position to
    /// the first section and, when the count-in is enabled, schedules
    /// the pre-roll clicks up front with the first step anchored right
    /// after them. Resuming from [`TransportState::Paused`] continues
    /// from the next unplayed step at the current clock time.
    pub fn play(&mut self) {
        match self.state {
            TransportState::Playing | TransportState::CountingIn => {}
            TransportState::Paused => {
                self.next_event_time = self.clock.now();
                self.state = TransportState::Playing;
                log::debug!("transport resumed at step {}", self.cursor.step_index);
            }
            TransportState::Stopped => {
                let toque = self.score.snapshot();
                if toque.sections.is_empty() {
                    log::warn!("play requested on a score with no sections");
                    return;
                }
                self.cursor.reset(&toque);
                let start = self.clock.now();
                if self.count_in_enabled {
                    match self.schedule_count_in(&toque, start) {
                        Ok(end) => {
                            self.count_in_until = end;
                            self.next_event_time = end;
                            self.state = TransportState::CountingIn;
                        }
                        Err(err) => {
                            self.fail(err);
                            return;
                        }
                    }
                } else {
                    self.next_event_time = start;
                    self.state = TransportState::Playing;
                }
                log::debug!("transport started at {start:.3}s");
            }
        }
    }

    /// Pause playback, keeping the current position.
    ///
    /// A wake-up already queued when this is called is inert: `tick`
    /// returns immediately once the state is not playing. Triggers
    /// already stamped inside the lookahead window may still sound.
    pub fn pause(&mut self) {
        if self.state.is_playing() {
            self.state = TransportState::Paused;
            log::debug!("transport paused at step {}", self.cursor.step_index);
        }
    }

    /// Stop playback and reset the position to the first section.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        let score = self.score.clone();
        score.with_score_read(|toque| self.cursor.reset(toque));
        log::debug!("transport stopped");
    }

    /// Reflect a live edit of the global BPM.
    ///
    /// Tempo fields are normally picked up only at section and
    /// repetition boundaries, but when no override is active the
    /// global BPM *is* the live tempo, so the edit propagates to the
    /// playhead immediately.
    pub fn apply_global_bpm_edit(&mut self) {
        let score = self.score.clone();
        score.with_score_read(|toque| {
            if toque.sections.is_empty() {
                self.cursor.playhead_bpm = toque.global_bpm;
                return;
            }
            let index = self.cursor.resolve_index(toque);
            if toque.sections[index].bpm_override.is_none() {
                self.cursor.playhead_bpm = toque.global_bpm;
            }
        });
    }

    /// Run one pass of the schedule loop.
    ///
    /// Fills the lookahead window with stamped triggers, advancing the
    /// cursor step by step. Each call runs to completion; it is
    /// bounded because every scheduled step strictly increases the
    /// next event time.
    pub fn tick(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        if self.state == TransportState::CountingIn && self.clock.now() >= self.count_in_until {
            self.state = TransportState::Playing;
        }

        let score = self.score.clone();
        let horizon = self.clock.now() + self.config.schedule_ahead_seconds;
        let mut skipped = 0usize;
        while self.next_event_time < horizon {
            match score.with_score_read(|toque| self.schedule_one(toque)) {
                StepOutcome::Scheduled => skipped = 0,
                StepOutcome::Skipped => {
                    skipped += 1;
                    // A full lap of skips means no section can produce
                    // a step; playback cannot make progress.
                    if skipped > score.section_count() {
                        log::warn!("no playable section in the score; stopping");
                        self.observer.on_ended();
                        self.state = TransportState::Stopped;
                        return;
                    }
                }
                StepOutcome::Halted => return,
            }
        }
    }

    /// Schedule the step under the cursor and advance.
    fn schedule_one(&mut self, toque: &Toque) -> StepOutcome {
        if toque.sections.is_empty() {
            log::warn!("score has no sections; stopping playback");
            self.observer.on_ended();
            self.state = TransportState::Stopped;
            return StepOutcome::Halted;
        }

        // Re-derive the active section by id on every step. A deleted
        // section resolves to index 0.
        let index = match self
            .cursor
            .active_section_id
            .as_deref()
            .and_then(|id| toque.section_index(id))
        {
            Some(index) => index,
            None => {
                log::debug!("active section vanished; falling back to the first section");
                self.cursor.active_section_id = Some(toque.sections[0].id.clone());
                0
            }
        };
        let section = &toque.sections[index];

        if section.measures.is_empty() {
            let advance = self.cursor.skip_exhausted_section(toque);
            if advance.wrapped && !self.loop_enabled {
                return self.end_of_score();
            }
            if let Some(id) = self.cursor.active_section_id.as_deref() {
                self.observer.on_section_changed(id);
            }
            return StepOutcome::Skipped;
        }

        let duration = match step_duration_seconds(section, self.cursor.playhead_bpm) {
            Ok(duration) => duration,
            Err(err) => {
                self.fail(err);
                return StepOutcome::Halted;
            }
        };

        let at = self.next_event_time;
        for event in events_for(section, self.cursor.measure_index, self.cursor.step_index) {
            if let Err(err) = self
                .sink
                .trigger_at(&event.instrument, event.stroke, event.volume, at)
            {
                log::warn!("trigger for '{}' rejected at {at:.3}s: {err}", event.instrument);
                self.observer.on_error(&err);
            }
        }
        self.observer.on_step(
            &section.id,
            self.cursor.measure_index,
            self.cursor.step_index,
            self.cursor.repetition_counter,
        );

        self.next_event_time += duration;

        let advance = self.cursor.advance(toque);
        if advance.wrapped && !self.loop_enabled {
            return self.end_of_score();
        }
        if advance.section_changed {
            if let Some(id) = self.cursor.active_section_id.as_deref() {
                self.observer.on_section_changed(id);
            }
        }
        StepOutcome::Scheduled
    }

    fn schedule_count_in(&mut self, toque: &Toque, start: f64) -> Result<f64, PlaybackError> {
        let first = &toque.sections[0];
        let step = step_duration_seconds(first, self.cursor.playhead_bpm)?;
        let beat = step * first.subdivision as f64;
        // Triplet feel gets two groups of three, straight feel one bar
        // of four, accenting each group's downbeat.
        let beats = if first.subdivision == 3 { 6 } else { 4 };
        for i in 0..beats {
            let accent = if first.subdivision == 3 {
                i % 3 == 0
            } else {
                i == 0
            };
            self.sink.click_at(accent, start + i as f64 * beat);
        }
        Ok(start + beats as f64 * beat)
    }

    fn end_of_score(&mut self) -> StepOutcome {
        log::debug!("end of score reached with looping disabled");
        self.observer.on_ended();
        self.state = TransportState::Stopped;
        StepOutcome::Halted
    }

    fn fail(&mut self, err: PlaybackError) {
        log::error!("fatal playback configuration error: {err}");
        self.observer.on_error(&err);
        self.state = TransportState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Measure, Section, Track};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<f64>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(0.0)))
        }

        fn set(&self, t: f64) {
            *self.0.lock().unwrap() = t;
        }
    }

    impl AudioClock for ManualClock {
        fn now(&self) -> f64 {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        triggers: Arc<Mutex<Vec<(String, Stroke, f32, f64)>>>,
        clicks: Arc<Mutex<Vec<(bool, f64)>>>,
    }

    impl RecordingSink {
        fn timestamps(&self) -> Vec<f64> {
            self.triggers.lock().unwrap().iter().map(|t| t.3).collect()
        }
    }

    impl TriggerSink for RecordingSink {
        fn trigger_at(
            &self,
            instrument: &str,
            stroke: Stroke,
            volume: f32,
            at_seconds: f64,
        ) -> Result<(), PlaybackError> {
            self.triggers
                .lock()
                .unwrap()
                .push((instrument.to_string(), stroke, volume, at_seconds));
            Ok(())
        }

        fn click_at(&self, accent: bool, at_seconds: f64) {
            self.clicks.lock().unwrap().push((accent, at_seconds));
        }
    }

    struct RejectingSink;

    impl TriggerSink for RejectingSink {
        fn trigger_at(&self, _: &str, _: Stroke, _: f32, _: f64) -> Result<(), PlaybackError> {
            Err(PlaybackError::Trigger {
                message: "backend unavailable".to_string(),
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingObserver {
        steps: Arc<Mutex<Vec<(String, usize, usize, u32)>>>,
        sections: Arc<Mutex<Vec<String>>>,
        ended: Arc<AtomicBool>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl PlaybackObserver for RecordingObserver {
        fn on_step(&self, section_id: &str, measure_index: usize, step_index: usize, rep: u32) {
            self.steps
                .lock()
                .unwrap()
                .push((section_id.to_string(), measure_index, step_index, rep));
        }

        fn on_section_changed(&self, section_id: &str) {
            self.sections.lock().unwrap().push(section_id.to_string());
        }

        fn on_ended(&self) {
            self.ended.store(true, Ordering::Relaxed);
        }

        fn on_error(&self, error: &PlaybackError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    fn one_track_section(id: &str, codes: &str) -> Section {
        Section::new(id, codes.len())
            .with_measure(Measure::new().with_track(Track::new("IYA", codes.len()).with_strokes(codes)))
    }

    struct Fixture {
        scheduler: PlaybackScheduler,
        clock: ManualClock,
        sink: RecordingSink,
        observer: RecordingObserver,
        score: ScoreManager,
    }

    fn fixture(toque: Toque) -> Fixture {
        let clock = ManualClock::new();
        let sink = RecordingSink::default();
        let observer = RecordingObserver::default();
        let score = ScoreManager::new(toque);
        let scheduler = PlaybackScheduler::new(
            score.clone(),
            clock.clone(),
            sink.clone(),
            observer.clone(),
        );
        Fixture {
            scheduler,
            clock,
            sink,
            observer,
            score,
        }
    }

    #[test]
    fn test_drift_free_timestamps_under_irregular_ticks() {
        // 120 BPM, sixteenths: steps land exactly 0.125s apart no
        // matter how raggedly the wake-up fires.
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OOOO"));
        let mut f = fixture(toque);
        f.scheduler.play();

        for t in [0.0, 0.031, 0.09, 0.2, 0.21, 0.55, 0.9, 1.41] {
            f.clock.set(t);
            f.scheduler.tick();
        }

        let stamps = f.sink.timestamps();
        assert!(stamps.len() >= 10);
        for (k, stamp) in stamps.iter().enumerate() {
            assert!(
                (stamp - k as f64 * 0.125).abs() < 1e-9,
                "step {k} drifted: {stamp}"
            );
        }
    }

    #[test]
    fn test_two_step_scenario() {
        // steps=2, strokes ['O', rest], 120 BPM: one trigger at t0,
        // none at t0+0.125, then the section wraps onto itself with
        // the repetition counter still 1.
        let toque = Toque::new(120.0).with_section(one_track_section("a", "O."));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.clock.set(0.05);
        f.scheduler.tick();

        let triggers = f.sink.triggers.lock().unwrap().clone();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].0, "IYA");
        assert_eq!(triggers[0].1, Stroke::Hit('O'));
        assert!(triggers[0].3.abs() < 1e-9);

        let steps = f.observer.steps.lock().unwrap().clone();
        assert_eq!(steps[0], ("a".to_string(), 0, 0, 1));
        assert_eq!(steps[1], ("a".to_string(), 0, 1, 1));

        // Self-wrap reported as a section change, counter unchanged.
        assert!(f.observer.sections.lock().unwrap().contains(&"a".to_string()));
        assert_eq!(f.scheduler.cursor().repetition_counter, 1);
    }

    #[test]
    fn test_play_is_noop_while_playing() {
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OOOO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.scheduler.tick();
        let before = f.scheduler.cursor().step_index;
        f.scheduler.play();
        assert_eq!(f.scheduler.cursor().step_index, before);
        assert_eq!(f.scheduler.transport_state(), TransportState::Playing);
    }

    #[test]
    fn test_pause_keeps_position_and_stale_tick_is_inert() {
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OOOOOOOO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.scheduler.tick();
        let scheduled = f.sink.timestamps().len();
        let position = f.scheduler.cursor().step_index;

        f.scheduler.pause();
        assert_eq!(f.scheduler.transport_state(), TransportState::Paused);

        // A wake-up queued before pause() fires anyway; it must not
        // schedule anything.
        f.clock.set(5.0);
        f.scheduler.tick();
        assert_eq!(f.sink.timestamps().len(), scheduled);
        assert_eq!(f.scheduler.cursor().step_index, position);
    }

    #[test]
    fn test_resume_continues_from_next_unplayed_step() {
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OOOO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.scheduler.tick();
        f.scheduler.pause();
        let position = f.scheduler.cursor().step_index;

        f.clock.set(10.0);
        f.scheduler.play();
        assert_eq!(f.scheduler.cursor().step_index, position);
        f.scheduler.tick();
        // Resumed steps are anchored at the resume time, not at the
        // pre-pause timeline.
        let stamps = f.sink.timestamps();
        let first_resumed = stamps.iter().find(|t| **t >= 10.0 - 1e-9);
        assert!(first_resumed.is_some());
    }

    #[test]
    fn test_stop_resets_position() {
        let toque = Toque::new(120.0)
            .with_section(one_track_section("a", "OO"))
            .with_section(one_track_section("b", "OO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.clock.set(0.2);
        f.scheduler.tick();
        assert_ne!(f.scheduler.cursor().active_section_id.as_deref(), Some("a"));

        f.scheduler.stop();
        assert_eq!(f.scheduler.transport_state(), TransportState::Stopped);
        assert_eq!(f.scheduler.cursor().active_section_id.as_deref(), Some("a"));
        assert_eq!(f.scheduler.cursor().step_index, 0);
        assert_eq!(f.scheduler.cursor().repetition_counter, 1);
    }

    #[test]
    fn test_loop_disabled_fires_ended() {
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OO"));
        let mut f = fixture(toque);
        f.scheduler.set_loop_enabled(false);
        f.scheduler.play();
        f.clock.set(1.0);
        f.scheduler.tick();

        assert!(f.observer.ended.load(Ordering::Relaxed));
        assert_eq!(f.scheduler.transport_state(), TransportState::Stopped);
        // Exactly one pass was scheduled.
        assert_eq!(f.sink.timestamps().len(), 2);
    }

    #[test]
    fn test_zero_measure_section_is_skipped() {
        let toque = Toque::new(120.0)
            .with_section(Section::new("empty", 4))
            .with_section(one_track_section("b", "OO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.scheduler.tick();

        let triggers = f.sink.triggers.lock().unwrap().clone();
        assert!(!triggers.is_empty());
        let steps = f.observer.steps.lock().unwrap().clone();
        assert!(steps.iter().all(|s| s.0 == "b"));
    }

    #[test]
    fn test_unplayable_score_stops_transport() {
        let toque = Toque::new(120.0)
            .with_section(Section::new("x", 4))
            .with_section(Section::new("y", 4));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.scheduler.tick();

        assert!(f.observer.ended.load(Ordering::Relaxed));
        assert_eq!(f.scheduler.transport_state(), TransportState::Stopped);
        assert!(f.sink.timestamps().is_empty());
    }

    #[test]
    fn test_play_on_empty_score_is_noop() {
        let mut f = fixture(Toque::new(120.0));
        f.scheduler.play();
        assert_eq!(f.scheduler.transport_state(), TransportState::Stopped);
    }

    #[test]
    fn test_invalid_bpm_is_fatal() {
        let toque = Toque::new(0.0).with_section(one_track_section("a", "OO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.scheduler.tick();

        assert_eq!(f.scheduler.transport_state(), TransportState::Stopped);
        assert!(f.sink.timestamps().is_empty());
        let errors = f.observer.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("BPM"));
    }

    #[test]
    fn test_deleted_active_section_falls_back_to_first() {
        let toque = Toque::new(120.0)
            .with_section(one_track_section("a", "OO"))
            .with_section(one_track_section("b", "OO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.clock.set(0.2);
        f.scheduler.tick();
        assert_eq!(f.scheduler.cursor().active_section_id.as_deref(), Some("b"));

        // The editor deletes the active section between wake-ups.
        f.score.with_score_write(|t| {
            t.sections.retain(|s| s.id != "b");
        });
        f.clock.set(0.5);
        f.scheduler.tick();

        assert_eq!(f.scheduler.cursor().active_section_id.as_deref(), Some("a"));
        assert!(f.scheduler.is_playing());
    }

    #[test]
    fn test_live_mute_is_picked_up_next_step() {
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OOOOOOOO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.scheduler.tick();
        let before = f.sink.timestamps().len();
        assert!(before > 0);

        f.score.with_score_write(|t| {
            t.sections[0].measures[0].tracks[0].muted = true;
        });
        f.clock.set(0.5);
        f.scheduler.tick();
        assert_eq!(f.sink.timestamps().len(), before);
    }

    #[test]
    fn test_live_global_bpm_edit_propagates_without_override() {
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OOOOOOOO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.scheduler.tick(); // schedules step 0 at t=0

        f.score.with_score_write(|t| t.global_bpm = 60.0);
        f.scheduler.apply_global_bpm_edit();
        assert!((f.scheduler.cursor().playhead_bpm - 60.0).abs() < 1e-9);

        f.clock.set(0.45);
        f.scheduler.tick();
        let stamps = f.sink.timestamps();
        // Step 1 keeps its pre-edit anchor; step 2 is a 60 BPM
        // sixteenth (0.25s) later.
        assert!((stamps[1] - 0.125).abs() < 1e-9);
        assert!((stamps[2] - 0.375).abs() < 1e-9);
    }

    #[test]
    fn test_live_global_bpm_edit_ignored_under_override() {
        let toque =
            Toque::new(120.0).with_section(one_track_section("a", "OOOO").with_bpm_override(100.0));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.score.with_score_write(|t| t.global_bpm = 60.0);
        f.scheduler.apply_global_bpm_edit();
        assert!((f.scheduler.cursor().playhead_bpm - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_trigger_rejection_does_not_halt() {
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OOOO"));
        let clock = ManualClock::new();
        let observer = RecordingObserver::default();
        let score = ScoreManager::new(toque);
        let mut scheduler =
            PlaybackScheduler::new(score, clock.clone(), RejectingSink, observer.clone());

        scheduler.play();
        clock.set(0.3);
        scheduler.tick();

        assert!(scheduler.is_playing());
        let errors = observer.errors.lock().unwrap().clone();
        assert!(!errors.is_empty());
        // Position notifications kept flowing past the rejections.
        assert!(observer.steps.lock().unwrap().len() > errors.len() / 2);
    }

    #[test]
    fn test_count_in_schedules_clicks_before_first_step() {
        let toque = Toque::new(120.0).with_section(one_track_section("a", "OOOO"));
        let mut f = fixture(toque);
        f.scheduler.set_count_in_enabled(true);
        f.scheduler.play();
        assert_eq!(f.scheduler.transport_state(), TransportState::CountingIn);

        // Four quarter-note clicks at 120 BPM, accent on the downbeat.
        let clicks = f.sink.clicks.lock().unwrap().clone();
        assert_eq!(clicks.len(), 4);
        assert_eq!(clicks[0], (true, 0.0));
        assert_eq!(clicks[1].0, false);
        assert!((clicks[3].1 - 1.5).abs() < 1e-9);

        // Nothing to schedule until the window reaches the pre-roll end.
        f.scheduler.tick();
        assert!(f.sink.timestamps().is_empty());

        f.clock.set(1.95);
        f.scheduler.tick();
        let stamps = f.sink.timestamps();
        assert_eq!(stamps.len(), 1);
        assert!((stamps[0] - 2.0).abs() < 1e-9);

        f.clock.set(2.0);
        f.scheduler.tick();
        assert_eq!(f.scheduler.transport_state(), TransportState::Playing);
    }

    #[test]
    fn test_count_in_triplet_feel_uses_six_clicks() {
        let toque = Toque::new(120.0).with_section(
            Section::new("a", 6)
                .with_subdivision(3)
                .with_measure(Measure::new().with_track(Track::new("IYA", 6).with_strokes("OOOOOO"))),
        );
        let mut f = fixture(toque);
        f.scheduler.set_count_in_enabled(true);
        f.scheduler.play();

        let clicks = f.sink.clicks.lock().unwrap().clone();
        assert_eq!(clicks.len(), 6);
        let accents: Vec<bool> = clicks.iter().map(|c| c.0).collect();
        assert_eq!(accents, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn test_section_change_notification_on_boundary() {
        let toque = Toque::new(120.0)
            .with_section(one_track_section("a", "OO").with_repetitions(2))
            .with_section(one_track_section("b", "OO"));
        let mut f = fixture(toque);
        f.scheduler.play();
        f.clock.set(0.45); // covers 2 reps of a (0.5s) minus a hair
        f.scheduler.tick();

        let sections = f.observer.sections.lock().unwrap().clone();
        assert_eq!(sections.first().map(String::as_str), Some("b"));
        let steps = f.observer.steps.lock().unwrap().clone();
        // Repetition counter visible in notifications: 1,1 then 2,2.
        assert_eq!(steps[2].3, 2);
    }
}
