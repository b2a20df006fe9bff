use common::{CursorSample, Recording, TimedEvent, millis};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::VirtualClock;
use crate::config::{PlaybackConfig, validate_speed};
use crate::dispatcher::{self, Dispatcher};
use crate::error::{PlaybackError, Result};
use crate::progress::{Progress, ProgressReporter};
use crate::scheduler::{EventScheduler, ScheduleRequest};
use crate::session::{Loaded, PlaybackStatus, Session, SharedSession, lock};

/// VCR-style transport over a recording, driving an injected [`Dispatcher`].
///
/// `Stopped -> Playing <-> Paused -> Stopped`. Every transport change tears down
/// the outstanding schedules and bumps the epoch before anything new is
/// scheduled. Operations that schedule deliveries spawn tokio tasks and must be
/// called from within a tokio runtime.
pub struct PlaybackController<D: Dispatcher> {
    config: PlaybackConfig,
    shared: SharedSession<D>,
    events: EventScheduler<TimedEvent>,
    cursors: EventScheduler<CursorSample>,
    reporter: ProgressReporter,
}

impl<D: Dispatcher> PlaybackController<D> {
    pub fn new(dispatcher: D) -> Self {
        Self::build(dispatcher, PlaybackConfig::default())
    }

    pub fn with_config(dispatcher: D, config: PlaybackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(dispatcher, config))
    }

    fn build(dispatcher: D, config: PlaybackConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Mutex::new(Session::new(dispatcher))),
            events: EventScheduler::new(),
            cursors: EventScheduler::new(),
            reporter: ProgressReporter::new(),
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Load `recording` and begin playing it from the start at speed 1.
    /// A session already in progress is stopped first.
    pub fn start(&mut self, mut recording: Recording) {
        self.stop();

        if recording.sort_streams() {
            warn!("Recording streams were not ordered by time; re-sorted");
        }
        let recording = Arc::new(recording);
        let duration = recording.duration();
        let wall = Instant::now();

        let epoch = {
            let mut session = lock(&self.shared);
            session.dispatcher.reset_for_playback(&recording.players);
            // scheduling covers t > 0 only, so whatever sits at t = 0 is applied up front
            for entry in recording.prefix(0) {
                dispatcher::deliver(&mut session.dispatcher, entry);
            }
            session.loaded = Some(Loaded {
                recording: recording.clone(),
                clock: VirtualClock::starting_at(wall),
                duration,
            });
            session.status = PlaybackStatus::Playing;
            session.bump_epoch()
        };

        info!(
            events = recording.events.len(),
            mouse_movements = recording.mouse_movements.len(),
            players = recording.players.len(),
            duration_ms = millis(duration),
            "Playback started"
        );
        self.schedule(ScheduleRequest {
            recording,
            from: Duration::ZERO,
            speed: 1.0,
            epoch,
            anchor: wall,
        });
    }

    /// No-op unless playing.
    pub fn pause(&mut self) {
        if self.status() != PlaybackStatus::Playing {
            return;
        }
        self.cancel_all();

        let wall = Instant::now();
        let progress = {
            let mut session = lock(&self.shared);
            session.bump_epoch();
            if let Some(loaded) = session.loaded.as_mut() {
                loaded.clock.pause_at(wall);
            }
            session.status = PlaybackStatus::Paused;
            session.progress_at(wall)
        };
        self.reporter.publish(progress);
        info!(position_ms = millis(progress.current), "Playback paused");
    }

    /// No-op if already playing.
    pub fn resume(&mut self) -> Result<()> {
        let wall = Instant::now();
        let request = {
            let mut guard = lock(&self.shared);
            let session = &mut *guard;
            match session.status {
                PlaybackStatus::Stopped => return Err(PlaybackError::NotStarted),
                PlaybackStatus::Playing => return Ok(()),
                PlaybackStatus::Paused => {}
            }
            let Some(loaded) = session.loaded.as_mut() else {
                return Err(PlaybackError::NotStarted);
            };
            loaded.clock.resume_at(wall);
            session.status = PlaybackStatus::Playing;
            session.epoch += 1;
            ScheduleRequest {
                recording: loaded.recording.clone(),
                from: loaded.clock.now_at(wall),
                speed: loaded.clock.speed(),
                epoch: session.epoch,
                anchor: wall,
            }
        };

        info!(position_ms = millis(request.from), speed = request.speed, "Playback resumed");
        self.schedule(request);
        Ok(())
    }

    /// Pause when playing, resume when paused. On a finished session this
    /// restarts from the beginning and plays.
    pub fn toggle_pause(&mut self) -> Result<()> {
        match self.status() {
            PlaybackStatus::Stopped => Err(PlaybackError::NotStarted),
            _ if self.is_finished() => {
                self.seek(Duration::ZERO)?;
                self.resume()
            }
            PlaybackStatus::Playing => {
                self.pause();
                Ok(())
            }
            PlaybackStatus::Paused => self.resume(),
        }
    }

    /// Jump to `target` (clamped to the recording) by rebuilding dispatcher
    /// state from scratch: reset, then synchronously apply every entry of both
    /// streams with `t <= target` in time order. Keeps the current play/pause state.
    pub fn seek(&mut self, target: Duration) -> Result<()> {
        self.cancel_all();

        let wall = Instant::now();
        let (request, progress) = {
            let mut guard = lock(&self.shared);
            let session = &mut *guard;
            let Some(loaded) = session.loaded.as_mut() else {
                return Err(PlaybackError::NotStarted);
            };
            let target = target.min(loaded.duration);

            session.dispatcher.reset_for_playback(&loaded.recording.players);
            let mut applied = 0usize;
            for entry in loaded.recording.prefix(millis(target)) {
                dispatcher::deliver(&mut session.dispatcher, entry);
                applied += 1;
            }
            loaded.clock.rebase_at(target, wall);
            debug!(target_ms = millis(target), applied, "Replayed prefix");

            session.epoch += 1;
            let epoch = session.epoch;
            let request = (session.status == PlaybackStatus::Playing).then(|| ScheduleRequest {
                recording: loaded.recording.clone(),
                from: target,
                speed: loaded.clock.speed(),
                epoch,
                anchor: wall,
            });
            (request, session.progress_at(wall))
        };

        info!(position_ms = millis(progress.current), "Seeked");
        match request {
            Some(request) => self.schedule(request),
            None => self.reporter.publish(progress),
        }
        Ok(())
    }

    /// Seek relative to the current position, clamped at both ends.
    pub fn seek_by(&mut self, delta_ms: i64) -> Result<()> {
        let current = self.current_time();
        let magnitude = Duration::from_millis(delta_ms.unsigned_abs());
        let target = if delta_ms < 0 {
            current.saturating_sub(magnitude)
        } else {
            current.saturating_add(magnitude)
        };
        self.seek(target)
    }

    /// Change the playback rate without moving the playhead. While paused the
    /// new rate only takes effect on the next resume.
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        validate_speed(speed)?;
        if self.status() == PlaybackStatus::Playing {
            self.cancel_all();
        }

        let wall = Instant::now();
        let (request, progress) = {
            let mut guard = lock(&self.shared);
            let session = &mut *guard;
            let Some(loaded) = session.loaded.as_mut() else {
                return Err(PlaybackError::NotStarted);
            };
            if session.status == PlaybackStatus::Playing {
                // freeze the position reached under the old rate before switching
                let position = loaded.clock.now_at(wall);
                loaded.clock.rebase_at(position, wall);
            }
            loaded.clock.set_speed_at(speed, wall);

            let request = if session.status == PlaybackStatus::Playing {
                let recording = loaded.recording.clone();
                let from = loaded.clock.now_at(wall);
                let epoch = session.bump_epoch();
                Some(ScheduleRequest {
                    recording,
                    from,
                    speed,
                    epoch,
                    anchor: wall,
                })
            } else {
                None
            };
            (request, session.progress_at(wall))
        };

        info!(speed, position_ms = millis(progress.current), "Playback speed changed");
        match request {
            Some(request) => self.schedule(request),
            None => self.reporter.publish(progress),
        }
        Ok(())
    }

    /// Move to the next configured speed step and return it.
    pub fn cycle_speed(&mut self) -> Result<f64> {
        let next = self.config.next_speed(self.speed());
        self.set_speed(next)?;
        Ok(next)
    }

    /// Cancel everything, hand the dispatcher back in its live state and drop
    /// the recording. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        self.cancel_all();

        let was_loaded = {
            let mut session = lock(&self.shared);
            if session.status == PlaybackStatus::Stopped && session.loaded.is_none() {
                false
            } else {
                session.bump_epoch();
                session.status = PlaybackStatus::Stopped;
                session.loaded = None;
                session.dispatcher.reset_to_live();
                true
            }
        };

        if was_loaded {
            self.reporter.publish(Progress::default());
            info!("Playback stopped");
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        lock(&self.shared).status
    }

    pub fn is_playing(&self) -> bool {
        self.status() == PlaybackStatus::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.status() == PlaybackStatus::Paused
    }

    /// Playhead reached the end of the recording.
    pub fn is_finished(&self) -> bool {
        self.progress().is_finished()
    }

    /// Virtual position clamped to `[0, duration]`; zero when stopped.
    pub fn current_time(&self) -> Duration {
        self.progress().current
    }

    pub fn duration(&self) -> Duration {
        lock(&self.shared)
            .loaded
            .as_ref()
            .map_or(Duration::ZERO, |loaded| loaded.duration)
    }

    pub fn speed(&self) -> f64 {
        lock(&self.shared)
            .loaded
            .as_ref()
            .map_or(1.0, |loaded| loaded.clock.speed())
    }

    /// A one-off readout of the playhead.
    pub fn progress(&self) -> Progress {
        lock(&self.shared).progress_at(Instant::now())
    }

    /// Readouts published on every refresh tick while playing, and after
    /// every transport change.
    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.reporter.subscribe()
    }

    /// Whether any delivery is still waiting to fire.
    pub fn has_pending(&self) -> bool {
        self.events.is_pending() || self.cursors.is_pending()
    }

    pub fn with_dispatcher<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&lock(&self.shared).dispatcher)
    }

    pub fn with_dispatcher_mut<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut lock(&self.shared).dispatcher)
    }

    fn cancel_all(&mut self) {
        self.events.cancel_all();
        self.cursors.cancel_all();
        self.reporter.stop();
    }

    fn schedule(&mut self, request: ScheduleRequest) {
        let epoch = request.epoch;
        self.events.schedule_from(&self.shared, request.clone());
        self.cursors.schedule_from(&self.shared, request);
        self.reporter
            .start(&self.shared, epoch, self.config.progress_interval());
    }
}

impl<D: Dispatcher> Drop for PlaybackController<D> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
