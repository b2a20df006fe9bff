use super::{Navigation, View};
use anyhow::Result;
use common::{Recording, COARSE_SEEK_MS, FINE_SEEK_MS};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use playback::{EventLog, PlaybackConfig, PlaybackController, PlaybackStatus, Progress};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};
use std::cell::Cell;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

fn saturating_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

pub struct ReplayViewerState {
    title: String,
    controller: PlaybackController<EventLog>,
    progress: watch::Receiver<Progress>,
    event_log_scroll: u16,
    event_log_total_lines: Cell<u16>,
    last_error: Option<String>,
}

impl ReplayViewerState {
    /// Starts playing immediately; needs a tokio runtime context.
    pub fn new(title: String, recording: Recording, config: PlaybackConfig) -> Result<Self> {
        let mut controller = PlaybackController::with_config(EventLog::new(), config)?;
        let progress = controller.subscribe_progress();
        controller.start(recording);
        Ok(Self {
            title,
            controller,
            progress,
            event_log_scroll: 0,
            event_log_total_lines: Cell::new(0),
            last_error: None,
        })
    }

    pub fn controller(&self) -> &PlaybackController<EventLog> {
        &self.controller
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn run(&mut self, op: impl FnOnce(&mut PlaybackController<EventLog>) -> playback::Result<()>) {
        match op(&mut self.controller) {
            Ok(()) => self.last_error = None,
            Err(e) => {
                warn!("Transport command failed: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn scroll_event_log_up(&mut self, lines: u16) {
        self.event_log_scroll = self.event_log_scroll.saturating_sub(lines);
    }

    fn scroll_event_log_down(&mut self, lines: u16) {
        let max_scroll = self.event_log_total_lines.get().saturating_sub(1);
        self.event_log_scroll = self.event_log_scroll.saturating_add(lines).min(max_scroll);
    }
}

impl View for ReplayViewerState {
    fn handle_key(&mut self, key: KeyEvent) -> Option<Navigation> {
        let shifted = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char(' ') => self.run(|c| c.toggle_pause()),
            KeyCode::Char('s') => self.run(|c| c.cycle_speed().map(|_| ())),
            KeyCode::Char('h') => self.run(|c| c.seek_by(-COARSE_SEEK_MS)),
            KeyCode::Char('l') => self.run(|c| c.seek_by(COARSE_SEEK_MS)),
            KeyCode::Char('J') => self.scroll_event_log_down(1),
            KeyCode::Char('K') => self.scroll_event_log_up(1),
            KeyCode::Char('j') if shifted => self.scroll_event_log_down(1),
            KeyCode::Char('k') if shifted => self.scroll_event_log_up(1),
            KeyCode::Char('j') => self.run(|c| c.seek_by(FINE_SEEK_MS)),
            KeyCode::Char('k') => self.run(|c| c.seek_by(-FINE_SEEK_MS)),
            KeyCode::Char('0') => self.run(|c| c.seek(Duration::ZERO)),
            KeyCode::PageUp => self.scroll_event_log_up(5),
            KeyCode::PageDown => self.scroll_event_log_down(5),
            KeyCode::Char('q') | KeyCode::Esc => {
                self.controller.stop();
                return Some(Navigation::Back);
            }
            _ => {}
        }
        None
    }

    fn draw(&self, frame: &mut Frame) {
        let player_rows = self.controller.with_dispatcher(|log| saturating_u16(log.players().len()));
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),               // Header
                Constraint::Length(3),               // Progress gauge
                Constraint::Length(player_rows.saturating_add(2)), // Players and cursors
                Constraint::Min(5),                  // Applied message log
                Constraint::Length(4),               // Controls help
            ])
            .split(frame.area());

        let progress = *self.progress.borrow();
        frame.render_widget(self.render_header(&progress), chunks[0]);
        frame.render_widget(Self::render_gauge(&progress), chunks[1]);
        frame.render_widget(self.render_players(), chunks[2]);
        self.render_event_log(frame, chunks[3]);
        frame.render_widget(self.render_controls(), chunks[4]);
    }
}

impl ReplayViewerState {
    fn render_header(&self, progress: &Progress) -> Paragraph {
        let state = match progress.status {
            _ if progress.is_finished() => "⏹ Ended",
            PlaybackStatus::Playing => "▶ Playing",
            PlaybackStatus::Paused => "⏸ Paused",
            PlaybackStatus::Stopped => "Stopped",
        };
        let title = format!(
            "{} | {} / {} | Speed: {}x | {}",
            self.title,
            progress.current_label(),
            progress.duration_label(),
            progress.speed,
            state
        );

        Paragraph::new(title)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
    }

    fn render_gauge(progress: &Progress) -> Gauge<'static> {
        Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(progress.ratio())
            .label(format!("{:.0}%", progress.ratio() * 100.0))
    }

    fn render_players(&self) -> Paragraph {
        let lines: Vec<Line> = self.controller.with_dispatcher(|log| {
            log.players()
                .iter()
                .map(|player| {
                    let cursor = log
                        .cursors()
                        .get(&player.id)
                        .map(|(x, y)| format!("({:.0}, {:.0})", x, y))
                        .unwrap_or_else(|| "-".to_string());
                    Line::from(vec![
                        Span::styled(format!("{} ", player.icon), Style::default().fg(Color::Yellow)),
                        Span::raw(format!("{} [{}] ", player.name, player.color)),
                        Span::styled(format!("cursor {}", cursor), Style::default().fg(Color::DarkGray)),
                    ])
                })
                .collect()
        });

        Paragraph::new(lines).block(Block::default().title("Players").borders(Borders::ALL))
    }

    fn render_event_log(&self, frame: &mut Frame, area: Rect) {
        let (lines, count) = self.controller.with_dispatcher(|log| {
            let lines: Vec<Line> = log
                .messages()
                .iter()
                .enumerate()
                .rev()
                .map(|(i, msg)| {
                    Line::from(vec![
                        Span::styled(format!("{:>4} ", i + 1), Style::default().fg(Color::DarkGray)),
                        Span::raw(msg.to_string()),
                    ])
                })
                .collect();
            (lines, log.messages().len())
        });
        self.event_log_total_lines.set(saturating_u16(lines.len()));

        let mut title = format!("Applied messages ({})", count);
        if let Some(error) = &self.last_error {
            title.push_str(&format!(" | {}", error));
        }

        let event_log = Paragraph::new(lines)
            .block(Block::default().title(title).borders(Borders::ALL))
            .style(Style::default().fg(Color::White))
            .scroll((self.event_log_scroll, 0));

        frame.render_widget(event_log, area);
    }

    fn render_controls(&self) -> Paragraph {
        let lines = vec![
            Line::from("Space: Play/Pause | s: Cycle speed | h/l: ±5s | j/k: ±1s | 0: Restart | q: Back"),
            Line::from("Shift+J/K: Scroll message log | PageUp/Down: Scroll message log (5 lines)"),
        ];

        Paragraph::new(lines)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
    }
}
