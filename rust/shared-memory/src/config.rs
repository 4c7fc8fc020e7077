//! Transport configuration

use crate::ring::MIN_RING_CAPACITY;
use crate::{Result, SharedMemoryError};
use overlay_link_core::DEFAULT_MAX_DRAW_COMMANDS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name both sides use for the shared segment
pub const DEFAULT_SEGMENT_NAME: &str = "DebugOverlay_SharedMem";

/// Name both sides use for the new-data signal
pub const DEFAULT_SIGNAL_NAME: &str = "DebugOverlay_NewDataEvent";

/// Default ring capacity (4 MiB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 2048 * 2048;

/// Transport settings shared by producer and consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Shared segment name
    #[serde(default = "default_segment_name")]
    pub segment_name: String,

    /// Signal name
    #[serde(default = "default_signal_name")]
    pub signal_name: String,

    /// Ring data bytes, a power of two
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Upper bound on one consumer wait, in milliseconds
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Command Store capacity
    #[serde(default = "default_max_draw_commands")]
    pub max_draw_commands: usize,
}

fn default_segment_name() -> String {
    DEFAULT_SEGMENT_NAME.to_string()
}

fn default_signal_name() -> String {
    DEFAULT_SIGNAL_NAME.to_string()
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_wait_timeout_ms() -> u64 {
    30
}

fn default_max_draw_commands() -> usize {
    DEFAULT_MAX_DRAW_COMMANDS
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            segment_name: default_segment_name(),
            signal_name: default_signal_name(),
            buffer_capacity: default_buffer_capacity(),
            wait_timeout_ms: default_wait_timeout_ms(),
            max_draw_commands: default_max_draw_commands(),
        }
    }
}

impl TransportConfig {
    /// Parse from TOML; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TransportConfig = toml::from_str(content)
            .map_err(|e| SharedMemoryError::Configuration(format!("invalid transport config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_name.is_empty() || self.signal_name.is_empty() {
            return Err(SharedMemoryError::Configuration("segment and signal names must not be empty".to_string()));
        }
        if self.buffer_capacity < MIN_RING_CAPACITY || !self.buffer_capacity.is_power_of_two() {
            return Err(SharedMemoryError::InvalidCapacity(self.buffer_capacity));
        }
        if self.max_draw_commands == 0 {
            return Err(SharedMemoryError::Configuration("max_draw_commands must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.segment_name, "DebugOverlay_SharedMem");
        assert_eq!(config.signal_name, "DebugOverlay_NewDataEvent");
        assert_eq!(config.buffer_capacity, 4 * 1024 * 1024);
        assert_eq!(config.wait_timeout(), Duration::from_millis(30));
        assert_eq!(config.max_draw_commands, 20_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TransportConfig::from_toml_str(
            r#"
            segment_name = "overlay_test"
            buffer_capacity = 65536
            "#,
        )
        .unwrap();
        assert_eq!(config.segment_name, "overlay_test");
        assert_eq!(config.buffer_capacity, 65536);
        assert_eq!(config.signal_name, DEFAULT_SIGNAL_NAME);
        assert_eq!(config.max_draw_commands, DEFAULT_MAX_DRAW_COMMANDS);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            TransportConfig::from_toml_str("buffer_capacity = 1000"),
            Err(SharedMemoryError::InvalidCapacity(1000))
        ));
        assert!(TransportConfig::from_toml_str("buffer_capacity = 4").is_err());
        assert!(TransportConfig::from_toml_str("max_draw_commands = 0").is_err());
        assert!(TransportConfig::from_toml_str("segment_name = \"\"").is_err());
        assert!(matches!(
            TransportConfig::from_toml_str("wait_timeout_ms = \"soon\""),
            Err(SharedMemoryError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            TransportConfig::from_file("/nonexistent/overlay-link.toml"),
            Err(SharedMemoryError::Io(_))
        ));
    }
}
