//! Engine configuration
//!
//! A single [`EngineConfig`] is built once by the host (usually deserialized
//! from a JSON file) and handed to every component constructor. Every field
//! has a default so partial configuration files are accepted.

use serde::{Deserialize, Serialize};

use crate::angle::Resolution;

/// Heading is considered lost this long after the last update
pub const HEADING_TIMEOUT_MS: u64 = 5_000;
/// Variation (and GPS derived data) is considered lost after this
pub const WATCHDOG_TIMEOUT_MS: u64 = 10_000;
/// An unacknowledged alarm sounds again after this interval
pub const ALARM_TIMEOUT_MS: u64 = 10_000;
/// Timed idle runs never transmit for less than this
pub const MIN_IDLE_RUN_MS: u64 = 30_000;

/// Spokes older than this (in seconds) are removed from the display
pub const MIN_AGE_SECONDS: u32 = 4;
pub const MAX_AGE_SECONDS: u32 = 12;

/// Colour thresholds used to classify returns for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayThresholds {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Default for DisplayThresholds {
    fn default() -> Self {
        DisplayThresholds {
            red: 200,
            green: 100,
            blue: 50,
        }
    }
}

/// Configuration shared by all radars handled by one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Canonical resolution of every spoke buffer
    pub resolution: Resolution,
    /// Intensity above which a return is "strong": it sets the history
    /// bit and is counted by guard zones
    pub alarm_threshold: u8,
    /// Spokes older than this many seconds are invalid, clamped to
    /// `MIN_AGE_SECONDS..=MAX_AGE_SECONDS`
    pub max_age_seconds: u32,
    pub heading_timeout_ms: u64,
    pub variation_timeout_ms: u64,
    /// How long a breach must persist before a pending alarm is confirmed
    pub confirm_window_ms: u64,
    /// Repeat interval of the audible alarm
    pub alarm_repeat_ms: u64,
    /// A new spoke whose range differs from the previous spoke's range by at
    /// least this ratio resets the whole buffer
    pub range_reset_ratio: f64,
    pub display: DisplayThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            resolution: Resolution::Coarse,
            alarm_threshold: 200,
            max_age_seconds: 6,
            heading_timeout_ms: HEADING_TIMEOUT_MS,
            variation_timeout_ms: WATCHDOG_TIMEOUT_MS,
            confirm_window_ms: 3_000,
            alarm_repeat_ms: ALARM_TIMEOUT_MS,
            range_reset_ratio: 1.25,
            display: DisplayThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Maximum spoke age in milliseconds, after clamping
    pub fn max_age_ms(&self) -> u64 {
        self.max_age_seconds.clamp(MIN_AGE_SECONDS, MAX_AGE_SECONDS) as u64 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"alarmThreshold": 120, "resolution": "fine"}"#).unwrap();
        assert_eq!(config.alarm_threshold, 120);
        assert_eq!(config.resolution, Resolution::Fine);
        assert_eq!(config.heading_timeout_ms, HEADING_TIMEOUT_MS);
        assert_eq!(config.display, DisplayThresholds::default());
    }

    #[test]
    fn test_max_age_clamped() {
        let mut config = EngineConfig::default();
        config.max_age_seconds = 1;
        assert_eq!(config.max_age_ms(), 4_000);
        config.max_age_seconds = 100;
        assert_eq!(config.max_age_ms(), 12_000);
    }
}
