//! Engine configuration.
//!
//! All fields have defaults taken from [`constants`](crate::constants), so a
//! partial JSON document only needs to name what it overrides.
//!
//! # Examples
//!
//! ```
//! use fingerlink_core::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "reader_poll_interval_ms": 250 }"#).unwrap();
//! assert_eq!(config.reader_poll_interval_ms, 250);
//! assert_eq!(config.poll_interval_ms, 10);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// Tunables for the acquisition engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sleep between polling loop iterations.
    pub poll_interval_ms: u64,

    /// Minimum spacing between reader enumerations.
    pub reader_poll_interval_ms: u64,

    /// Minimum spacing for the other rate-limited steps.
    pub tick_interval_ms: u64,

    /// Comparison scores strictly below this value count as a match.
    pub false_match_rate: u32,

    /// Capacity of the raw capture result channel.
    pub capture_channel_capacity: usize,

    /// Resolution requested when arming a capture.
    pub capture_resolution_dpi: u32,

    /// Upper bound on identify candidates.
    pub max_identify_candidates: u32,

    /// Bound on buffer-size negotiation retries.
    pub negotiation_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            reader_poll_interval_ms: DEFAULT_READER_POLL_INTERVAL_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            false_match_rate: DEFAULT_FALSE_MATCH_RATE,
            capture_channel_capacity: DEFAULT_CAPTURE_CHANNEL_CAPACITY,
            capture_resolution_dpi: DEFAULT_CAPTURE_RESOLUTION_DPI,
            max_identify_candidates: IDENTIFICATION_LEN,
            negotiation_attempts: DEFAULT_NEGOTIATION_ATTEMPTS,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is malformed or a value is
    /// out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.capture_channel_capacity == 0 {
            return Err(Error::Config(
                "capture_channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.negotiation_attempts == 0 {
            return Err(Error::Config(
                "negotiation_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_identify_candidates == 0 {
            return Err(Error::Config(
                "max_identify_candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the polling loop sleep.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the reader enumeration interval.
    pub fn with_reader_poll_interval(mut self, interval: Duration) -> Self {
        self.reader_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the interval shared by the other rate-limited steps.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the match acceptance threshold.
    pub fn with_false_match_rate(mut self, rate: u32) -> Self {
        self.false_match_rate = rate;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reader_poll_interval(&self) -> Duration {
        Duration::from_millis(self.reader_poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.reader_poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.tick_interval(), Duration::from_millis(5000));
        assert_eq!(config.false_match_rate, PROBABILITY_ONE / 100_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{ "false_match_rate": 42 }"#).unwrap();
        assert_eq!(config.false_match_rate, 42);
        assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
    }

    #[test]
    fn test_from_json_rejects_zero_capacity() {
        let result = EngineConfig::from_json(r#"{ "capture_channel_capacity": 0 }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_builder_helpers() {
        let config = EngineConfig::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_reader_poll_interval(Duration::ZERO)
            .with_tick_interval(Duration::from_millis(20))
            .with_false_match_rate(7);
        assert_eq!(config.poll_interval_ms, 1);
        assert_eq!(config.reader_poll_interval_ms, 0);
        assert_eq!(config.tick_interval_ms, 20);
        assert_eq!(config.false_match_rate, 7);
    }
}
