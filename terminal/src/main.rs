use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::time::Duration;
use tracing::{error, info};

use terminal::app::App;
use terminal::config::{init_logging, Args};

fn main() -> Result<()> {
    // Load .env file if exists
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_logging(&args)?;
    let config = args.playback_config()?;

    if !args.replay_dir.exists() {
        eprintln!("Replay directory does not exist: {:?}", args.replay_dir);
        eprintln!("Creating directory...");
        std::fs::create_dir_all(&args.replay_dir)?;
    }
    info!("Looking for replays in {:?}", args.replay_dir);

    // Playback timers run on the runtime's workers while the UI loop owns this thread
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = App::new(args.replay_dir.clone(), config).and_then(|mut app| run_app(&mut terminal, &mut app));

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Replay terminal exited with error: {:#}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| app.draw(f))?;

        // The poll timeout is the redraw rate while a replay plays
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !app.handle_key(key)? {
                    return Ok(());
                }
            }
        }
    }
}
