pub mod clock;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod progress;
pub mod reader;
mod scheduler;
mod session;

pub use clock::VirtualClock;
pub use config::PlaybackConfig;
pub use controller::PlaybackController;
pub use dispatcher::{Dispatcher, EventLog};
pub use error::{PlaybackError, Result};
pub use progress::Progress;
pub use reader::{RecordingReader, RecordingSummary};
pub use session::PlaybackStatus;
