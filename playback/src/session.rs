use common::Recording;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::clock::VirtualClock;
use crate::progress::Progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What exists only between `start` and `stop`.
pub(crate) struct Loaded {
    pub recording: Arc<Recording>,
    pub clock: VirtualClock,
    pub duration: Duration,
}

impl Loaded {
    pub fn position_at(&self, wall: Instant) -> Duration {
        self.clock.now_at(wall).min(self.duration)
    }
}

/// All mutable playback state, behind one lock.
///
/// A delivery checks `epoch` and dispatches while holding the lock, and every
/// transport operation bumps `epoch` while holding it, so a delivery from an
/// earlier epoch can never land after the bump.
pub(crate) struct Session<D> {
    /// Never reset, so tags from a previous session can't match a later one
    pub epoch: u64,
    pub status: PlaybackStatus,
    pub loaded: Option<Loaded>,
    pub dispatcher: D,
}

pub(crate) type SharedSession<D> = Arc<Mutex<Session<D>>>;

impl<D> Session<D> {
    pub fn new(dispatcher: D) -> Self {
        Self {
            epoch: 0,
            status: PlaybackStatus::Stopped,
            loaded: None,
            dispatcher,
        }
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// True when a delivery tagged with `epoch` may still mutate state.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.status == PlaybackStatus::Playing
    }

    pub fn progress_at(&self, wall: Instant) -> Progress {
        match &self.loaded {
            Some(loaded) => Progress {
                current: loaded.position_at(wall),
                duration: loaded.duration,
                speed: loaded.clock.speed(),
                status: self.status,
            },
            None => Progress::default(),
        }
    }
}

pub(crate) fn lock<D>(shared: &Mutex<Session<D>>) -> MutexGuard<'_, Session<D>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
