use super::{Navigation, View};
use anyhow::Result;
use common::format_clock;
use crossterm::event::{KeyCode, KeyEvent};
use playback::{RecordingReader, RecordingSummary};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file found in the replay directory, summarized when the directory is scanned.
#[derive(Debug, Clone)]
pub enum BrowserEntry {
    Ready(RecordingSummary),
    Unreadable { path: PathBuf, reason: String },
}

impl BrowserEntry {
    fn load(path: PathBuf) -> Self {
        match RecordingReader::summarize(&path) {
            Ok(summary) => Self::Ready(summary),
            Err(e) => {
                let reason = format!("{:#}", anyhow::Error::from(e));
                warn!(?path, "Recording cannot be summarized: {}", reason);
                Self::Unreadable { path, reason }
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Ready(summary) => &summary.path,
            Self::Unreadable { path, .. } => path,
        }
    }

    pub fn file_name(&self) -> &str {
        self.path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("?")
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// One-line description next to the file name.
    pub fn headline(&self) -> String {
        match self {
            Self::Ready(summary) => format!(
                "{} · {} · {} · {}",
                format_clock(summary.duration),
                count(summary.events, "event"),
                count(summary.mouse_movements, "cursor sample"),
                count(summary.players.len(), "player"),
            ),
            Self::Unreadable { .. } => "unreadable".to_string(),
        }
    }
}

fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

pub struct RecordingBrowser {
    dir: PathBuf,
    entries: Vec<BrowserEntry>,
    selected: usize,
    notice: Option<String>,
}

impl RecordingBrowser {
    /// Summarizes every recording under `dir`. Files that fail to load are
    /// listed as unreadable rather than failing the scan.
    pub fn scan(dir: &Path) -> Result<Self> {
        let entries = Self::load_entries(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
            selected: 0,
            notice: None,
        })
    }

    fn load_entries(dir: &Path) -> Result<Vec<BrowserEntry>> {
        let entries: Vec<_> = RecordingReader::list_recordings(dir)?
            .into_iter()
            .map(BrowserEntry::load)
            .collect();
        debug!(?dir, found = entries.len(), "Scanned replay directory");
        Ok(entries)
    }

    /// Re-read the directory, staying on the same file when it is still there.
    pub fn rescan(&mut self) -> Result<()> {
        let current = self.selected().map(|entry| entry.path().to_path_buf());
        self.entries = Self::load_entries(&self.dir)?;
        self.selected = 0;
        if let Some(path) = current {
            self.select_path(&path);
        }
        Ok(())
    }

    pub fn entries(&self) -> &[BrowserEntry] {
        &self.entries
    }

    pub fn selected(&self) -> Option<&BrowserEntry> {
        self.entries.get(self.selected)
    }

    pub fn select_path(&mut self, path: &Path) -> bool {
        match self.entries.iter().position(|entry| entry.path() == path) {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    fn select(&mut self, idx: usize) {
        self.selected = idx.min(self.entries.len().saturating_sub(1));
        self.notice = None;
    }

    fn open_selected(&mut self) -> Option<Navigation> {
        match self.selected()? {
            BrowserEntry::Ready(summary) => Some(Navigation::Open(summary.path.clone())),
            BrowserEntry::Unreadable { reason, .. } => {
                self.notice = Some(reason.clone());
                None
            }
        }
    }
}

impl View for RecordingBrowser {
    fn handle_key(&mut self, key: KeyEvent) -> Option<Navigation> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(Navigation::Quit),
            KeyCode::Enter => return self.open_selected(),
            KeyCode::Char('j') | KeyCode::Down => self.select(self.selected + 1),
            KeyCode::Char('k') | KeyCode::Up => self.select(self.selected.saturating_sub(1)),
            KeyCode::Char('g') | KeyCode::Home => self.select(0),
            KeyCode::Char('G') | KeyCode::End => self.select(usize::MAX),
            KeyCode::Char('r') => {
                if let Err(e) = self.rescan() {
                    warn!("Rescan failed: {:#}", e);
                    self.notice = Some(format!("Rescan failed: {:#}", e));
                }
            }
            _ => {}
        }
        None
    }

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Directory
                Constraint::Min(3),    // Recordings
                Constraint::Length(4), // Selected recording
                Constraint::Length(3), // Keys or notice
            ])
            .split(frame.area());

        let header = Paragraph::new(format!("Recordings in {}", self.dir.display()))
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        self.draw_list(frame, chunks[1]);
        frame.render_widget(self.details(), chunks[2]);

        let footer = match &self.notice {
            Some(notice) => Paragraph::new(notice.as_str()).style(Style::default().fg(Color::Red)),
            None => Paragraph::new("↑/k ↓/j: Move | g/G: First/Last | Enter: Play | r: Rescan | q: Quit")
                .style(Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(
            footer
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL)),
            chunks[3],
        );
    }
}

impl RecordingBrowser {
    fn draw_list(&self, frame: &mut Frame, area: Rect) {
        let name_width = self
            .entries
            .iter()
            .map(|entry| entry.file_name().chars().count())
            .max()
            .unwrap_or(0);

        let items: Vec<ListItem> = self
            .entries
            .iter()
            .map(|entry| {
                let detail_style = if entry.is_ready() {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default().fg(Color::Red)
                };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{:<width$}  ", entry.file_name(), width = name_width)),
                    Span::styled(entry.headline(), detail_style),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!("Recordings ({})", self.entries.len()))
                    .borders(Borders::ALL),
            )
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");

        // ratatui scrolls the list to keep the selection visible
        let mut state = ListState::default().with_selected(self.selected().map(|_| self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn details(&self) -> Paragraph {
        let lines = match self.selected() {
            None => vec![Line::from("No recordings found. Press 'r' to rescan or 'q' to quit.")],
            Some(BrowserEntry::Ready(summary)) => vec![
                Line::from(format!("Players: {}", summary.players.join(", "))),
                Line::from(Span::styled(
                    summary.path.display().to_string(),
                    Style::default().fg(Color::DarkGray),
                )),
            ],
            Some(BrowserEntry::Unreadable { path, reason }) => vec![
                Line::from(Span::styled(reason.clone(), Style::default().fg(Color::Red))),
                Line::from(Span::styled(
                    path.display().to_string(),
                    Style::default().fg(Color::DarkGray),
                )),
            ],
        };
        Paragraph::new(lines).block(Block::default().title("Selected").borders(Borders::ALL))
    }
}
