//! Simulator configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::Path;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// One reading per hour.
pub const DEFAULT_INTERVAL_MS: u64 = 3_600_000;
/// 30 days of hourly samples.
pub const DEFAULT_HISTORY_CAPACITY: usize = 720;
pub const DEFAULT_BACKFILL_HOURS: usize = 24;
pub const DEFAULT_TREND_WINDOW: usize = 5;
/// Cadence used for live demos.
pub const DEMO_INTERVAL_MS: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulatorConfig {
    /// Milliseconds between timer ticks
    pub interval_ms: u64,

    /// Maximum readings retained in history
    pub history_capacity: usize,

    /// Hourly readings synthesized when starting with an empty history
    pub backfill_hours: usize,

    /// Readings per metric considered for trend detection
    pub trend_window: usize,

    /// Fixed RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            backfill_hours: DEFAULT_BACKFILL_HOURS,
            trend_window: DEFAULT_TREND_WINDOW,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// Defaults with the 10-second demo cadence.
    pub fn demo() -> Self {
        Self {
            interval_ms: DEMO_INTERVAL_MS,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("intervalMs must be positive".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("historyCapacity must be at least 1".into()));
        }
        if self.backfill_hours > self.history_capacity {
            return Err(ConfigError::Invalid(format!(
                "backfillHours ({}) exceeds historyCapacity ({})",
                self.backfill_hours, self.history_capacity
            )));
        }
        if self.trend_window == 0 {
            return Err(ConfigError::Invalid("trendWindow must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SimulatorConfig::default();
        assert_eq!(config.interval_ms, 3_600_000);
        assert_eq!(config.history_capacity, 720);
        assert!(config.validate().is_ok());
        assert_eq!(SimulatorConfig::demo().interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "intervalMs": 5000, "seed": 7 }}"#).unwrap();

        let config = SimulatorConfig::load(file.path()).unwrap();
        assert_eq!(config.interval_ms, 5000);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "historyCapacity": 10, "backfillHours": 24 }}"#).unwrap();

        match SimulatorConfig::load(file.path()) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("backfillHours")),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(SimulatorConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }
}
