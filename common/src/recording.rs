use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::iter::Peekable;
use std::slice::Iter;
use std::time::Duration;

/// Anything positioned on the recording timeline.
pub trait Timed {
    /// Offset from the start of the recording in milliseconds.
    fn t(&self) -> u64;

    fn at(&self) -> Duration {
        Duration::from_millis(self.t())
    }
}

/// A server message captured during a live session. `msg` is opaque to playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub t: u64,
    pub msg: Value,
}

/// A cursor position sample for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorSample {
    pub t: u64,
    pub player_id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

impl Timed for TimedEvent {
    fn t(&self) -> u64 {
        self.t
    }
}

impl Timed for CursorSample {
    fn t(&self) -> u64 {
        self.t
    }
}

/// A recorded multiplayer session: two independent streams plus the roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub events: Vec<TimedEvent>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mouse_movements: Vec<CursorSample>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub players: Vec<PlayerInfo>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry of either stream, borrowed from a [`Recording`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplayEntry<'a> {
    Event(&'a TimedEvent),
    Cursor(&'a CursorSample),
}

impl Timed for ReplayEntry<'_> {
    fn t(&self) -> u64 {
        match self {
            ReplayEntry::Event(e) => e.t,
            ReplayEntry::Cursor(c) => c.t,
        }
    }
}

impl Recording {
    pub fn new(
        events: Vec<TimedEvent>,
        mouse_movements: Vec<CursorSample>,
        players: Vec<PlayerInfo>,
    ) -> Self {
        Self {
            events,
            mouse_movements,
            players,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.mouse_movements.is_empty()
    }

    /// Latest timestamp across both streams, 0 when both are empty.
    pub fn duration_ms(&self) -> u64 {
        let last_event = self.events.iter().map(Timed::t).max().unwrap_or(0);
        let last_cursor = self.mouse_movements.iter().map(Timed::t).max().unwrap_or(0);
        last_event.max(last_cursor)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms())
    }

    /// Stable-sort both streams by `t` if either is out of order.
    /// Returns true when anything had to be reordered.
    pub fn sort_streams(&mut self) -> bool {
        let mut reordered = false;
        if !is_ordered(&self.events) {
            self.events.sort_by_key(|e| e.t);
            reordered = true;
        }
        if !is_ordered(&self.mouse_movements) {
            self.mouse_movements.sort_by_key(|m| m.t);
            reordered = true;
        }
        reordered
    }

    /// Every entry of both streams in increasing `t` order.
    /// On equal `t`, events come before cursor samples.
    pub fn merged(&self) -> Merged<'_> {
        Merged {
            events: self.events.iter().peekable(),
            cursors: self.mouse_movements.iter().peekable(),
        }
    }

    /// Merged entries with `t <= until_ms`.
    pub fn prefix(&self, until_ms: u64) -> impl Iterator<Item = ReplayEntry<'_>> {
        self.merged().take_while(move |entry| entry.t() <= until_ms)
    }
}

fn is_ordered<T: Timed>(stream: &[T]) -> bool {
    stream.windows(2).all(|w| w[0].t() <= w[1].t())
}

pub struct Merged<'a> {
    events: Peekable<Iter<'a, TimedEvent>>,
    cursors: Peekable<Iter<'a, CursorSample>>,
}

impl<'a> Iterator for Merged<'a> {
    type Item = ReplayEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match (self.events.peek(), self.cursors.peek()) {
            (Some(e), Some(c)) if c.t < e.t => self.cursors.next().map(ReplayEntry::Cursor),
            (Some(_), _) => self.events.next().map(ReplayEntry::Event),
            (None, Some(_)) => self.cursors.next().map(ReplayEntry::Cursor),
            (None, None) => None,
        }
    }
}
