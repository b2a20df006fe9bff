use common::{DEFAULT_PROGRESS_INTERVAL_MS, DEFAULT_SPEED_STEPS, MAX_SPEED, MIN_SPEED};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// Tunables for a playback controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Multipliers visited in order by `cycle_speed`, wrapping at the end
    pub speed_steps: Vec<f64>,
    /// How often the progress reporter samples the clock while playing
    pub progress_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed_steps: DEFAULT_SPEED_STEPS.to_vec(),
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl PlaybackConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.speed_steps.is_empty() {
            return Err(PlaybackError::EmptySpeedSteps);
        }
        for &step in &self.speed_steps {
            validate_speed(step)?;
        }
        if self.progress_interval_ms == 0 {
            return Err(PlaybackError::ZeroProgressInterval);
        }
        Ok(())
    }

    /// The step after `current`. Speeds outside the list jump to the next
    /// larger step, or wrap to the first one.
    pub fn next_speed(&self, current: f64) -> f64 {
        let first = self.speed_steps.first().copied().unwrap_or(1.0);
        match self.speed_steps.iter().position(|&s| s == current) {
            Some(idx) => self.speed_steps.get(idx + 1).copied().unwrap_or(first),
            None => self
                .speed_steps
                .iter()
                .copied()
                .find(|&s| s > current)
                .unwrap_or(first),
        }
    }
}

pub(crate) fn validate_speed(speed: f64) -> Result<()> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(PlaybackError::InvalidSpeed(speed));
    }
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(PlaybackError::SpeedOutOfRange {
            speed,
            min: MIN_SPEED,
            max: MAX_SPEED,
        });
    }
    Ok(())
}
