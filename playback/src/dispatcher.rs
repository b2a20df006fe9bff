use anyhow::Result;
use common::{CursorSample, PlayerInfo, ReplayEntry};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// The state-mutation path shared by live play and replay.
///
/// Playback forwards recorded payloads verbatim and never looks inside `msg`.
pub trait Dispatcher: Send + 'static {
    /// Apply one server message exactly as if it had arrived live.
    fn apply(&mut self, msg: &Value) -> Result<()>;

    /// Apply one cursor sample. Cursor samples are cosmetic, so the default ignores them.
    fn apply_cursor(&mut self, _sample: &CursorSample) -> Result<()> {
        Ok(())
    }

    /// Re-initialize to the state of a freshly started game with these players.
    fn reset_for_playback(&mut self, players: &[PlayerInfo]);

    /// Re-initialize to the ordinary, non-playback state.
    fn reset_to_live(&mut self);
}

/// Forward one entry, isolating a failure to that entry.
pub(crate) fn deliver<D: Dispatcher>(dispatcher: &mut D, entry: ReplayEntry<'_>) {
    let outcome = match entry {
        ReplayEntry::Event(event) => dispatcher.apply(&event.msg),
        ReplayEntry::Cursor(sample) => dispatcher.apply_cursor(sample),
    };
    if let Err(e) = outcome {
        match entry {
            ReplayEntry::Event(event) => warn!(t = event.t, "Dispatcher rejected message: {:#}", e),
            ReplayEntry::Cursor(sample) => {
                warn!(t = sample.t, player = %sample.player_id, "Dispatcher rejected cursor sample: {:#}", e)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    #[default]
    Live,
    Playback,
}

/// A dispatcher that keeps what it was given: applied messages in order,
/// the last cursor position per player and the current roster.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    mode: LogMode,
    players: Vec<PlayerInfo>,
    messages: Vec<Value>,
    cursors: BTreeMap<String, (f64, f64)>,
    cursor_samples: usize,
    total_delivered: usize,
    resets: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    /// Messages applied since the last reset, oldest first.
    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    pub fn cursors(&self) -> &BTreeMap<String, (f64, f64)> {
        &self.cursors
    }

    pub fn cursor_samples(&self) -> usize {
        self.cursor_samples
    }

    /// Every message and cursor sample ever delivered, across resets.
    pub fn total_delivered(&self) -> usize {
        self.total_delivered
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    fn clear(&mut self) {
        self.messages.clear();
        self.cursors.clear();
        self.cursor_samples = 0;
        self.resets += 1;
    }
}

impl Dispatcher for EventLog {
    fn apply(&mut self, msg: &Value) -> Result<()> {
        self.messages.push(msg.clone());
        self.total_delivered += 1;
        Ok(())
    }

    fn apply_cursor(&mut self, sample: &CursorSample) -> Result<()> {
        self.cursors
            .insert(sample.player_id.clone(), (sample.x, sample.y));
        self.cursor_samples += 1;
        self.total_delivered += 1;
        Ok(())
    }

    fn reset_for_playback(&mut self, players: &[PlayerInfo]) {
        self.clear();
        self.players = players.to_vec();
        self.mode = LogMode::Playback;
    }

    fn reset_to_live(&mut self) {
        self.clear();
        self.players.clear();
        self.mode = LogMode::Live;
    }
}
