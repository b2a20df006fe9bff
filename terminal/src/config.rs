use anyhow::{Context, Result};
use clap::Parser;
use common::{DEFAULT_PROGRESS_INTERVAL_MS, DEFAULT_SPEED_STEPS};
use playback::PlaybackConfig;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_REPLAY_DIR: &str = "/tmp/arcade_replays";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "replay-terminal",
    about = "Browse recorded multiplayer sessions and play them back"
)]
pub struct Args {
    /// Directory searched (recursively) for recordings
    #[arg(env = "REPLAY_DIR", default_value = DEFAULT_REPLAY_DIR)]
    pub replay_dir: PathBuf,

    /// Speed multipliers cycled with `s`, comma separated
    #[arg(
        long,
        env = "REPLAY_SPEEDS",
        value_delimiter = ',',
        default_values_t = DEFAULT_SPEED_STEPS.to_vec()
    )]
    pub speeds: Vec<f64>,

    /// Progress readout refresh interval in milliseconds
    #[arg(long, env = "REPLAY_PROGRESS_INTERVAL_MS", default_value_t = DEFAULT_PROGRESS_INTERVAL_MS)]
    pub progress_interval_ms: u64,

    /// Where logs go while the terminal UI owns the screen
    #[arg(long, env = "REPLAY_LOG_FILE", default_value = "/tmp/replay_terminal.log")]
    pub log_file: PathBuf,
}

impl Args {
    pub fn playback_config(&self) -> Result<PlaybackConfig> {
        let config = PlaybackConfig {
            speed_steps: self.speeds.clone(),
            progress_interval_ms: self.progress_interval_ms,
        };
        config.validate().context("Invalid playback configuration")?;
        Ok(config)
    }
}

/// Send tracing output to `path`; stdout belongs to the alternate screen.
pub fn init_logging(args: &Args) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("Failed to open log file: {:?}", args.log_file))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}
