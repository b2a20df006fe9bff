use common::{CursorSample, Recording, ReplayEntry, Timed, TimedEvent, millis};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::dispatcher::{self, Dispatcher};
use crate::session::{Session, SharedSession, lock};

/// One of the two independent timelines in a recording.
pub(crate) trait ReplayStream: Timed + Send + Sync + Sized + 'static {
    const NAME: &'static str;

    fn entries(recording: &Recording) -> &[Self];

    fn entry(&self) -> ReplayEntry<'_>;
}

impl ReplayStream for TimedEvent {
    const NAME: &'static str = "events";

    fn entries(recording: &Recording) -> &[Self] {
        &recording.events
    }

    fn entry(&self) -> ReplayEntry<'_> {
        ReplayEntry::Event(self)
    }
}

impl ReplayStream for CursorSample {
    const NAME: &'static str = "mouse_movements";

    fn entries(recording: &Recording) -> &[Self] {
        &recording.mouse_movements
    }

    fn entry(&self) -> ReplayEntry<'_> {
        ReplayEntry::Cursor(self)
    }
}

/// Everything a schedule needs, captured at the moment it is created.
#[derive(Clone)]
pub(crate) struct ScheduleRequest {
    pub recording: Arc<Recording>,
    /// Virtual time at `anchor`; only entries strictly after it are scheduled
    pub from: Duration,
    pub speed: f64,
    pub epoch: u64,
    pub anchor: Instant,
}

impl ScheduleRequest {
    /// Wall-clock instant at which an entry at virtual time `at` is due.
    fn deadline(&self, at: Duration) -> Instant {
        self.anchor + at.saturating_sub(self.from).div_f64(self.speed)
    }
}

struct Pending {
    epoch: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Delivers the future entries of one stream at their real-time deadlines.
///
/// Each schedule runs as one task that walks the stream in order and sleeps
/// until every entry's absolute deadline, all computed from the same anchor.
pub(crate) struct EventScheduler<T> {
    pending: Option<Pending>,
    _stream: PhantomData<fn() -> T>,
}

impl<T: ReplayStream> EventScheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: None,
            _stream: PhantomData,
        }
    }

    /// Replaces any outstanding schedule for this stream.
    pub fn schedule_from<D: Dispatcher>(&mut self, shared: &SharedSession<D>, request: ScheduleRequest) {
        self.cancel_all();
        let token = CancellationToken::new();
        let epoch = request.epoch;
        let handle = tokio::spawn(run_stream::<T, D>(shared.clone(), request, token.clone()));
        self.pending = Some(Pending {
            epoch,
            token,
            handle,
        });
    }

    pub fn cancel_all(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
            pending.handle.abort();
            trace!(stream = T::NAME, epoch = pending.epoch, "Cancelled pending deliveries");
        }
    }

    /// Whether a schedule exists that has not yet drained its stream.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }
}

impl<T> Drop for EventScheduler<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
            pending.handle.abort();
        }
    }
}

async fn run_stream<T: ReplayStream, D: Dispatcher>(
    shared: SharedSession<D>,
    request: ScheduleRequest,
    token: CancellationToken,
) {
    let entries = T::entries(&request.recording);
    let first = entries.partition_point(|entry| entry.at() <= request.from);
    debug!(
        stream = T::NAME,
        epoch = request.epoch,
        from_ms = millis(request.from),
        speed = request.speed,
        count = entries.len() - first,
        "Scheduling deliveries"
    );

    for entry in &entries[first..] {
        tokio::select! {
            biased;

            _ = token.cancelled() => return,

            _ = sleep_until(request.deadline(entry.at())) => {}
        }

        if !deliver_if_current(&shared, request.epoch, entry.entry()) {
            trace!(stream = T::NAME, epoch = request.epoch, t = entry.t(), "Dropped stale delivery");
            return;
        }
    }

    debug!(stream = T::NAME, epoch = request.epoch, "Stream drained");
}

fn deliver_if_current<D: Dispatcher>(shared: &Mutex<Session<D>>, epoch: u64, entry: ReplayEntry<'_>) -> bool {
    let mut session = lock(shared);
    if !session.accepts(epoch) {
        return false;
    }
    dispatcher::deliver(&mut session.dispatcher, entry);
    true
}
