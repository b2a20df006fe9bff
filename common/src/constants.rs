/// Speed multipliers cycled through by the transport controls
pub const DEFAULT_SPEED_STEPS: [f64; 3] = [1.0, 2.0, 4.0];

/// Progress readout refresh interval in milliseconds (roughly one display frame)
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 16;

/// Step used by the viewer for coarse relative seeks
pub const COARSE_SEEK_MS: i64 = 5_000;

/// Step used by the viewer for fine relative seeks
pub const FINE_SEEK_MS: i64 = 1_000;

/// Slowest accepted playback multiplier
pub const MIN_SPEED: f64 = 0.01;

/// Fastest accepted playback multiplier
pub const MAX_SPEED: f64 = 1_000.0;
