use common::format_clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::dispatcher::Dispatcher;
use crate::session::{PlaybackStatus, SharedSession, lock};

/// Playhead readout for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Virtual position, clamped to `[0, duration]`
    pub current: Duration,
    pub duration: Duration,
    pub speed: f64,
    pub status: PlaybackStatus,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            current: Duration::ZERO,
            duration: Duration::ZERO,
            speed: 1.0,
            status: PlaybackStatus::Stopped,
        }
    }
}

impl Progress {
    /// Position as a fraction in `[0, 1]`. An empty recording reads as complete.
    pub fn ratio(&self) -> f64 {
        if self.duration.is_zero() {
            return if self.status == PlaybackStatus::Stopped { 0.0 } else { 1.0 };
        }
        (self.current.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self) -> bool {
        self.status != PlaybackStatus::Stopped && self.current >= self.duration
    }

    pub fn current_label(&self) -> String {
        format_clock(self.current)
    }

    pub fn duration_label(&self) -> String {
        format_clock(self.duration)
    }
}

/// Samples the clock on a fixed interval while playing and publishes the
/// result on a watch channel. Only ever reads the session.
pub(crate) struct ProgressReporter {
    sender: Arc<watch::Sender<Progress>>,
    task: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Progress::default());
        Self {
            sender: Arc::new(sender),
            task: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.sender.subscribe()
    }

    pub fn publish(&self, progress: Progress) {
        self.sender.send_replace(progress);
    }

    /// Poll until the session leaves `Playing` under `epoch` or reaches the end.
    pub fn start<D: Dispatcher>(&mut self, shared: &SharedSession<D>, epoch: u64, period: Duration) {
        self.stop();
        let shared = shared.clone();
        let sender = self.sender.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let progress = {
                    let session = lock(&shared);
                    if !session.accepts(epoch) {
                        break;
                    }
                    session.progress_at(Instant::now())
                };
                sender.send_replace(progress);
                if progress.is_finished() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}
