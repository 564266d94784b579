//! The driver thread.
//!
//! [`Runtime::start`] spawns one thread that repeatedly drains control
//! messages, runs one pass of the schedule loop, and sleeps for the
//! configured wake-up interval. Control messages and ticks are
//! processed on the same thread in order, so a `pause` or `stop` is
//! fully applied before the next tick can run and no tick ever
//! observes stale transport state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::scheduler::{PlaybackObserver, PlaybackScheduler, TriggerSink};
use crate::score::ScoreManager;
use crate::timing::{AudioClock, SchedulerConfig, SystemClock};

/// Control messages into the driver thread.
///
/// Transport commands act on the scheduler; the edit messages write
/// into the score model, which the scheduler picks up on its own
/// cadence. Hosts holding the [`ScoreManager`] directly may also edit
/// the score from any thread; these messages exist so simple hosts
/// need only the handle.
#[derive(Clone, Debug)]
pub enum ControlMessage {
    /// Start or resume playback.
    Play,
    /// Pause, keeping the position.
    Pause,
    /// Stop and reset to the first section.
    Stop,
    /// Set the global BPM. Propagates to the playhead immediately when
    /// no section override is active.
    SetGlobalBpm { bpm: f64 },
    /// Set or clear a section's BPM override.
    SetSectionBpmOverride {
        section_id: String,
        bpm: Option<f64>,
    },
    /// Mute or unmute a track.
    SetMuted {
        section_id: String,
        measure_index: usize,
        track_index: usize,
        muted: bool,
    },
    /// Set a track's volume.
    SetVolume {
        section_id: String,
        measure_index: usize,
        track_index: usize,
        volume: f32,
    },
    /// Enable or disable wrap-around looping.
    SetLoopEnabled { enabled: bool },
    /// Enable or disable the count-in pre-roll.
    SetCountInEnabled { enabled: bool },
}

/// Handle for interacting with a running [`Runtime`].
#[derive(Clone)]
pub struct RuntimeHandle {
    message_tx: Sender<ControlMessage>,
    score: ScoreManager,
    shutdown: Arc<AtomicBool>,
}

impl RuntimeHandle {
    /// The shared score handle, for direct edits and snapshots.
    pub fn score(&self) -> &ScoreManager {
        &self.score
    }

    /// Send a control message to the driver thread.
    pub fn send(&self, message: ControlMessage) {
        if self.message_tx.send(message).is_err() {
            log::debug!("runtime thread gone; dropping control message");
        }
    }

    /// Start or resume playback.
    pub fn play(&self) {
        self.send(ControlMessage::Play);
    }

    /// Pause playback.
    pub fn pause(&self) {
        self.send(ControlMessage::Pause);
    }

    /// Stop playback and rewind.
    pub fn stop(&self) {
        self.send(ControlMessage::Stop);
    }

    /// Set the global BPM.
    pub fn set_global_bpm(&self, bpm: f64) {
        self.send(ControlMessage::SetGlobalBpm { bpm });
    }

    /// Set or clear a section's BPM override.
    pub fn set_section_bpm_override(&self, section_id: impl Into<String>, bpm: Option<f64>) {
        self.send(ControlMessage::SetSectionBpmOverride {
            section_id: section_id.into(),
            bpm,
        });
    }

    /// Mute or unmute a track.
    pub fn set_muted(
        &self,
        section_id: impl Into<String>,
        measure_index: usize,
        track_index: usize,
        muted: bool,
    ) {
        self.send(ControlMessage::SetMuted {
            section_id: section_id.into(),
            measure_index,
            track_index,
            muted,
        });
    }

    /// Set a track's volume.
    pub fn set_volume(
        &self,
        section_id: impl Into<String>,
        measure_index: usize,
        track_index: usize,
        volume: f32,
    ) {
        self.send(ControlMessage::SetVolume {
            section_id: section_id.into(),
            measure_index,
            track_index,
            volume,
        });
    }

    /// Enable or disable wrap-around looping.
    pub fn set_loop_enabled(&self, enabled: bool) {
        self.send(ControlMessage::SetLoopEnabled { enabled });
    }

    /// Enable or disable the count-in pre-roll.
    pub fn set_count_in_enabled(&self, enabled: bool) {
        self.send(ControlMessage::SetCountInEnabled { enabled });
    }

    /// Signal the driver thread to exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Owns the driver thread.
pub struct Runtime {
    handle: RuntimeHandle,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl Runtime {
    /// Start a runtime with the default clock and tuning.
    pub fn start(
        score: ScoreManager,
        sink: impl TriggerSink + 'static,
        observer: impl PlaybackObserver + 'static,
    ) -> Result<Self> {
        Self::start_with(
            score,
            SystemClock::new(),
            sink,
            observer,
            SchedulerConfig::default(),
        )
    }

    /// Start a runtime with a specific clock and tuning.
    pub fn start_with(
        score: ScoreManager,
        clock: impl AudioClock + 'static,
        sink: impl TriggerSink + 'static,
        observer: impl PlaybackObserver + 'static,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let (message_tx, message_rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = RuntimeHandle {
            message_tx,
            score: score.clone(),
            shutdown: shutdown.clone(),
        };

        let scheduler =
            PlaybackScheduler::new(score.clone(), clock, sink, observer).with_config(config);
        let thread_shutdown = shutdown.clone();
        let thread_handle = thread::Builder::new()
            .name("toque-playback".to_string())
            .spawn(move || {
                let mut driver = DriverThread {
                    scheduler,
                    score,
                    message_rx,
                };
                driver.run(thread_shutdown);
            })
            .context("failed to spawn the playback driver thread")?;

        log::info!("playback runtime started");
        Ok(Self {
            handle,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get a handle to interact with the runtime.
    pub fn handle(&self) -> &RuntimeHandle {
        &self.handle
    }

    /// Shut down the runtime gracefully.
    pub fn shutdown(mut self) {
        self.handle.shutdown();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// The thread body: message pump plus schedule loop.
struct DriverThread {
    scheduler: PlaybackScheduler,
    score: ScoreManager,
    message_rx: Receiver<ControlMessage>,
}

impl DriverThread {
    fn run(&mut self, shutdown: Arc<AtomicBool>) {
        let interval = self.scheduler.config().lookahead_interval;
        while !shutdown.load(Ordering::Relaxed) {
            self.drain_messages();
            self.scheduler.tick();
            thread::sleep(interval);
        }
        log::debug!("playback driver thread exiting");
    }

    /// Process all pending control messages.
    fn drain_messages(&mut self) {
        while let Ok(message) = self.message_rx.try_recv() {
            self.apply(message);
        }
    }

    fn apply(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Play => self.scheduler.play(),
            ControlMessage::Pause => self.scheduler.pause(),
            ControlMessage::Stop => self.scheduler.stop(),
            ControlMessage::SetGlobalBpm { bpm } => {
                self.score.with_score_write(|toque| toque.global_bpm = bpm);
                self.scheduler.apply_global_bpm_edit();
            }
            ControlMessage::SetSectionBpmOverride { section_id, bpm } => {
                self.score.with_score_write(|toque| {
                    match toque.section_mut(&section_id) {
                        Some(section) => section.bpm_override = bpm,
                        None => log::debug!("bpm override target '{section_id}' not found"),
                    }
                });
            }
            ControlMessage::SetMuted {
                section_id,
                measure_index,
                track_index,
                muted,
            } => {
                self.with_track(&section_id, measure_index, track_index, |track| {
                    track.muted = muted;
                });
            }
            ControlMessage::SetVolume {
                section_id,
                measure_index,
                track_index,
                volume,
            } => {
                self.with_track(&section_id, measure_index, track_index, |track| {
                    track.volume = volume;
                });
            }
            ControlMessage::SetLoopEnabled { enabled } => {
                self.scheduler.set_loop_enabled(enabled);
            }
            ControlMessage::SetCountInEnabled { enabled } => {
                self.scheduler.set_count_in_enabled(enabled);
            }
        }
    }

    /// Edit one track, tolerating targets that vanished under a
    /// concurrent structural edit.
    fn with_track(
        &self,
        section_id: &str,
        measure_index: usize,
        track_index: usize,
        edit: impl FnOnce(&mut crate::score::Track),
    ) {
        self.score.with_score_write(|toque| {
            let target = toque
                .section_mut(section_id)
                .and_then(|s| s.measures.get_mut(measure_index))
                .and_then(|m| m.tracks.get_mut(track_index));
            match target {
                Some(track) => edit(track),
                None => log::debug!(
                    "track edit target {section_id}/{measure_index}/{track_index} not found"
                ),
            }
        });
    }
}
