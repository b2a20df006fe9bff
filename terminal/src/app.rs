use anyhow::Result;
use crossterm::event::KeyEvent;
use playback::{PlaybackConfig, RecordingReader};
use ratatui::Frame;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::views::{Navigation, RecordingBrowser, ReplayViewerState, View};

pub enum Screen {
    Browse(Box<RecordingBrowser>),
    Watch(Box<ReplayViewerState>),
}

/// Moves between the recording browser and one playback session at a time.
/// Every viewer gets a controller built from the same `PlaybackConfig`.
pub struct App {
    screen: Screen,
    replay_dir: PathBuf,
    config: PlaybackConfig,
    /// Recording played most recently, reselected on the way back
    last_opened: Option<PathBuf>,
}

impl App {
    pub fn new(replay_dir: PathBuf, config: PlaybackConfig) -> Result<Self> {
        let browser = RecordingBrowser::scan(&replay_dir)?;
        Ok(Self {
            screen: Screen::Browse(Box::new(browser)),
            replay_dir,
            config,
            last_opened: None,
        })
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn draw(&self, frame: &mut Frame) {
        match &self.screen {
            Screen::Browse(browser) => browser.draw(frame),
            Screen::Watch(viewer) => viewer.draw(frame),
        }
    }

    /// Returns `false` once the user asked to quit. Opening a recording
    /// starts playback, so this must run inside a tokio runtime context.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        let navigation = match &mut self.screen {
            Screen::Browse(browser) => browser.handle_key(key),
            Screen::Watch(viewer) => viewer.handle_key(key),
        };
        match navigation {
            None => {}
            Some(Navigation::Quit) => return Ok(false),
            Some(Navigation::Open(path)) => self.open(&path)?,
            Some(Navigation::Back) => self.back()?,
        }
        Ok(true)
    }

    /// A recording that no longer loads keeps the browser up with the reason
    /// shown instead of ending the program.
    fn open(&mut self, path: &Path) -> Result<()> {
        let recording = match RecordingReader::load_recording(path) {
            Ok(recording) => recording,
            Err(e) => {
                let reason = format!("{:#}", anyhow::Error::from(e));
                warn!("Cannot open replay: {}", reason);
                if let Screen::Browse(browser) = &mut self.screen {
                    browser.set_notice(reason);
                }
                return Ok(());
            }
        };

        let title = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recording")
            .to_string();
        info!(?path, "Opening replay");
        let viewer = ReplayViewerState::new(title, recording, self.config.clone())?;
        self.last_opened = Some(path.to_path_buf());
        self.screen = Screen::Watch(Box::new(viewer));
        Ok(())
    }

    fn back(&mut self) -> Result<()> {
        // dropping the viewer stops its controller
        let mut browser = RecordingBrowser::scan(&self.replay_dir)?;
        if let Some(path) = &self.last_opened {
            browser.select_path(path);
        }
        self.screen = Screen::Browse(Box::new(browser));
        Ok(())
    }
}
