use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracker_core::{BucketWidth, Tier};

use crate::error::{AppError, Result};

/// Usage is re-checked at least this often, whatever the requested interval.
pub const MAX_INTERVAL_SECS: f64 = 600.0;

const DEFAULT_LOOKBACK_HOURS: u32 = 6;
const DEFAULT_INTERVAL_SECS: f64 = 15.0;
const DEFAULT_TOKEN_RATE: f64 = 10_000.0;
const DEFAULT_REQUEST_RATE: f64 = 120.0;

/// Per-minute rates at or above which a spike alert is raised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeThresholds {
    pub tokens_per_minute: f64,
    pub requests_per_minute: f64,
}

impl Default for SpikeThresholds {
    fn default() -> Self {
        Self {
            tokens_per_minute: DEFAULT_TOKEN_RATE,
            requests_per_minute: DEFAULT_REQUEST_RATE,
        }
    }
}

/// Settings fixed for the lifetime of a tracking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub lookback_hours: u32,
    pub bucket_width: BucketWidth,
    pub tier: Tier,
    pub interval_secs: f64,
    pub thresholds: SpikeThresholds,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            bucket_width: BucketWidth::default(),
            tier: Tier::default(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            thresholds: SpikeThresholds::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| AppError::Message(format!("serialize config: {}", err)))
    }

    /// Checks the config and returns the effective one, with the poll
    /// interval capped at [`MAX_INTERVAL_SECS`].
    pub fn validate(mut self) -> Result<Self> {
        if self.lookback_hours < 1 {
            return Err(AppError::InvalidInput(
                "lookback-hours must be at least 1".to_string(),
            ));
        }
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "interval must be a positive number of seconds (got {})",
                self.interval_secs
            )));
        }
        if self.interval_secs > MAX_INTERVAL_SECS {
            tracing::warn!(
                requested = self.interval_secs,
                "interval capped at {}s to check usage at least every 10 minutes",
                MAX_INTERVAL_SECS
            );
            self.interval_secs = MAX_INTERVAL_SECS;
        }
        for (name, value) in [
            ("spike-token-rate", self.thresholds.tokens_per_minute),
            ("spike-request-rate", self.thresholds.requests_per_minute),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::InvalidInput(format!(
                    "{} must be a non-negative number (got {})",
                    name, value
                )));
            }
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        if self.interval_secs.is_finite() {
            Duration::from_secs_f64(self.interval_secs.clamp(0.0, MAX_INTERVAL_SECS))
        } else {
            Duration::from_secs_f64(MAX_INTERVAL_SECS)
        }
    }
}
