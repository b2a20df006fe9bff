use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the playback engine.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// A transport operation that needs a loaded recording was called while stopped
    #[error("no recording is loaded")]
    NotStarted,

    #[error("speed multiplier must be positive and finite, got {0}")]
    InvalidSpeed(f64),

    /// Finite positive speeds outside this range would overflow clock arithmetic
    #[error("speed multiplier {speed} is outside {min}..={max}")]
    SpeedOutOfRange { speed: f64, min: f64, max: f64 },

    #[error("at least one speed step is required")]
    EmptySpeedSteps,

    #[error("progress interval must be at least 1 ms")]
    ZeroProgressInterval,

    /// Recording file could not be read or decompressed
    #[error("failed to read recording {path:?}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Recording file is not valid recording JSON
    #[error("failed to parse recording {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = PlaybackError> = std::result::Result<T, E>;
