//! Store configuration
//!
//! `StoreConfig` sizes the backing buffers and sets the minimum dead space
//! before compaction is considered. `CompactionStrategy` carries the ratios
//! chosen by the external resource policy; it has no default on purpose.

use crate::types::{MAX_BUFFERS, MAX_OFFSET};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum dead bytes before compaction is considered
pub const DEFAULT_DEAD_BYTES_SLACK: usize = 0x10000;

/// Minimum dead address space (entries) before compaction is considered
pub const DEFAULT_DEAD_ADDRESS_SPACE_SLACK: usize = 0x10000;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Entries in the first buffer (later buffers double, up to the maximum)
    pub initial_buffer_entries: u32,
    /// Maximum entries in one buffer (at most 2^22)
    pub max_entries_per_buffer: u32,
    /// Maximum number of buffers (at most 2^10)
    pub max_buffers: u32,
    /// Dead bytes below which memory compaction is never triggered
    pub dead_bytes_slack: usize,
    /// Dead entries below which address-space compaction is never triggered
    pub dead_address_space_slack: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            initial_buffer_entries: 1024,
            max_entries_per_buffer: MAX_OFFSET,
            max_buffers: MAX_BUFFERS,
            dead_bytes_slack: DEFAULT_DEAD_BYTES_SLACK,
            dead_address_space_slack: DEFAULT_DEAD_ADDRESS_SPACE_SLACK,
        }
    }
}

impl StoreConfig {
    /// Create config for testing
    ///
    /// Uses tiny buffers and no compaction slack so that buffer switches and
    /// compaction happen with a handful of values.
    pub fn for_testing() -> Self {
        StoreConfig {
            initial_buffer_entries: 16,
            max_entries_per_buffer: 64,
            max_buffers: 64,
            dead_bytes_slack: 0,
            dead_address_space_slack: 0,
        }
    }

    /// Set initial buffer size
    pub fn with_initial_buffer_entries(mut self, entries: u32) -> Self {
        self.initial_buffer_entries = entries;
        self
    }

    /// Set maximum buffer size
    pub fn with_max_entries_per_buffer(mut self, entries: u32) -> Self {
        self.max_entries_per_buffer = entries;
        self
    }

    /// Set maximum number of buffers
    pub fn with_max_buffers(mut self, buffers: u32) -> Self {
        self.max_buffers = buffers;
        self
    }

    /// Set both compaction slack thresholds
    pub fn with_compaction_slack(mut self, dead_bytes: usize, dead_address_space: usize) -> Self {
        self.dead_bytes_slack = dead_bytes;
        self.dead_address_space_slack = dead_address_space;
        self
    }

    /// Address-space ceiling implied by the buffer limits
    pub fn address_space_limit(&self) -> usize {
        self.max_buffers as usize * self.max_entries_per_buffer as usize
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_buffer_entries < 2 {
            return Err(ConfigError::BufferTooSmall(self.initial_buffer_entries));
        }
        if self.max_entries_per_buffer > MAX_OFFSET {
            return Err(ConfigError::BufferTooLarge(self.max_entries_per_buffer));
        }
        if self.initial_buffer_entries > self.max_entries_per_buffer {
            return Err(ConfigError::InitialExceedsMax {
                initial: self.initial_buffer_entries,
                max: self.max_entries_per_buffer,
            });
        }
        if self.max_buffers == 0 || self.max_buffers > MAX_BUFFERS {
            return Err(ConfigError::InvalidBufferCount(self.max_buffers));
        }
        Ok(())
    }
}

/// Compaction thresholds supplied by the resource policy
///
/// A ratio of `0.2` means compaction is wanted once dead space exceeds 20%
/// of used space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompactionStrategy {
    max_dead_bytes_ratio: f64,
    max_dead_address_space_ratio: f64,
}

impl CompactionStrategy {
    /// Create a strategy from the two ratios
    pub fn new(max_dead_bytes_ratio: f64, max_dead_address_space_ratio: f64) -> Self {
        CompactionStrategy {
            max_dead_bytes_ratio,
            max_dead_address_space_ratio,
        }
    }

    /// Maximum tolerated dead-bytes ratio
    pub fn max_dead_bytes_ratio(&self) -> f64 {
        self.max_dead_bytes_ratio
    }

    /// Maximum tolerated dead-address-space ratio
    pub fn max_dead_address_space_ratio(&self) -> f64 {
        self.max_dead_address_space_ratio
    }

    /// Validate the ratios (finite and non-negative)
    pub fn validate(&self) -> Result<(), ConfigError> {
        for ratio in [self.max_dead_bytes_ratio, self.max_dead_address_space_ratio] {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(ConfigError::InvalidRatio(ratio));
            }
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Initial buffer cannot hold the reserved entry plus one value
    #[error("Initial buffer of {0} entries is too small")]
    BufferTooSmall(u32),

    /// Buffer larger than the offset bits can address
    #[error("Buffer of {0} entries exceeds the addressable offset range")]
    BufferTooLarge(u32),

    /// Initial buffer exceeds the maximum buffer size
    #[error("Initial buffer size {initial} exceeds maximum {max}")]
    InitialExceedsMax {
        /// Configured initial size
        initial: u32,
        /// Configured maximum size
        max: u32,
    },

    /// Buffer count outside the addressable range
    #[error("Invalid buffer count {0}")]
    InvalidBufferCount(u32),

    /// Ratio is negative or not finite
    #[error("Invalid compaction ratio {0}")]
    InvalidRatio(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dead_bytes_slack, 0x10000);
        assert_eq!(config.address_space_limit(), 1usize << 32);
    }

    #[test]
    fn test_testing_config_is_valid() {
        assert!(StoreConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::default()
            .with_initial_buffer_entries(64)
            .with_max_entries_per_buffer(256)
            .with_max_buffers(8)
            .with_compaction_slack(10, 20);

        assert_eq!(config.initial_buffer_entries, 64);
        assert_eq!(config.max_entries_per_buffer, 256);
        assert_eq!(config.max_buffers, 8);
        assert_eq!(config.dead_bytes_slack, 10);
        assert_eq!(config.dead_address_space_slack, 20);
        assert_eq!(config.address_space_limit(), 2048);
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        let config = StoreConfig::default().with_initial_buffer_entries(1);
        assert_eq!(config.validate(), Err(ConfigError::BufferTooSmall(1)));

        let config = StoreConfig::default().with_max_entries_per_buffer(MAX_OFFSET + 1);
        assert!(matches!(config.validate(), Err(ConfigError::BufferTooLarge(_))));

        let config = StoreConfig::default()
            .with_initial_buffer_entries(512)
            .with_max_entries_per_buffer(256);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InitialExceedsMax { .. })
        ));

        let config = StoreConfig::default().with_max_buffers(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidBufferCount(0)));
    }

    #[test]
    fn test_parse_partial_config() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"initial_buffer_entries": 128, "max_buffers": 16}"#).unwrap();
        assert_eq!(config.initial_buffer_entries, 128);
        assert_eq!(config.max_buffers, 16);
        assert_eq!(config.max_entries_per_buffer, MAX_OFFSET);
    }

    #[test]
    fn test_compaction_strategy_requires_both_ratios() {
        let parsed: Result<CompactionStrategy, _> =
            serde_json::from_str(r#"{"max_dead_bytes_ratio": 0.2}"#);
        assert!(parsed.is_err());

        let strategy: CompactionStrategy = serde_json::from_str(
            r#"{"max_dead_bytes_ratio": 0.2, "max_dead_address_space_ratio": 0.5}"#,
        )
        .unwrap();
        assert_eq!(strategy.max_dead_bytes_ratio(), 0.2);
        assert_eq!(strategy.max_dead_address_space_ratio(), 0.5);
    }

    #[test]
    fn test_compaction_strategy_validation() {
        assert!(CompactionStrategy::new(0.2, 0.2).validate().is_ok());
        assert!(CompactionStrategy::new(-0.1, 0.2).validate().is_err());
        assert!(CompactionStrategy::new(0.2, f64::NAN).validate().is_err());
    }
}
