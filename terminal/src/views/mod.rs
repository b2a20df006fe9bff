pub mod recording_browser;
pub mod replay_viewer;

pub use recording_browser::{BrowserEntry, RecordingBrowser};
pub use replay_viewer::ReplayViewerState;

use crossterm::event::KeyEvent;
use ratatui::Frame;
use std::path::PathBuf;

/// Where a key press sends the user next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Quit,
    /// Leave the viewer for the browser
    Back,
    Open(PathBuf),
}

/// One full-screen page. Playback advances on its own timers, so a view only
/// reacts to keys and draws whatever state it currently holds.
pub trait View {
    fn handle_key(&mut self, key: KeyEvent) -> Option<Navigation>;
    fn draw(&self, frame: &mut Frame);
}
