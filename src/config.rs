//! Configuration management for Floodgate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FloodgateError, Result};

/// Configuration for a keyed limiter registry.
///
/// One rate applies to every key; there are no per-key tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Requests-per-minute ceiling shared by all keys
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: f64,

    /// Maximum tokens a bucket can hold (burst allowance)
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: f64,

    /// Idle time after which a key's bucket is evicted, in milliseconds
    #[serde(default = "default_idle_eviction_window_ms")]
    pub idle_eviction_window_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
            burst_capacity: default_burst_capacity(),
            idle_eviction_window_ms: default_idle_eviction_window_ms(),
        }
    }
}

fn default_max_requests_per_minute() -> f64 {
    20.0
}

fn default_burst_capacity() -> f64 {
    1.0
}

fn default_idle_eviction_window_ms() -> u64 {
    120_000
}

impl RegistryConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RegistryConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Called once at registry construction; an invalid configuration is
    /// fatal to startup rather than surfaced per-call.
    pub fn validate(&self) -> Result<()> {
        if !self.max_requests_per_minute.is_finite() || self.max_requests_per_minute <= 0.0 {
            return Err(FloodgateError::Config(format!(
                "max_requests_per_minute must be a positive finite number, got {}",
                self.max_requests_per_minute
            )));
        }
        if !self.burst_capacity.is_finite() || self.burst_capacity < 1.0 {
            return Err(FloodgateError::Config(format!(
                "burst_capacity must be at least 1, got {}",
                self.burst_capacity
            )));
        }
        if self.idle_eviction_window_ms == 0 {
            return Err(FloodgateError::Config(
                "idle_eviction_window_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Token refill rate derived from the per-minute ceiling.
    pub fn refill_rate_per_second(&self) -> f64 {
        self.max_requests_per_minute / 60.0
    }

    /// Idle eviction window as a [`Duration`].
    pub fn idle_eviction_window(&self) -> Duration {
        Duration::from_millis(self.idle_eviction_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.max_requests_per_minute, 20.0);
        assert_eq!(config.burst_capacity, 1.0);
        assert_eq!(config.idle_eviction_window_ms, 120_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refill_rate_derivation() {
        let config = RegistryConfig {
            max_requests_per_minute: 20.0,
            ..Default::default()
        };

        // 20 per minute is one token every 3 seconds
        assert!((config.refill_rate_per_second() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(config.idle_eviction_window(), Duration::from_secs(120));
    }

    #[test]
    fn test_from_yaml_with_partial_fields() {
        let yaml = r#"
max_requests_per_minute: 120
"#;
        let config = RegistryConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.max_requests_per_minute, 120.0);
        // Unspecified fields fall back to defaults
        assert_eq!(config.burst_capacity, 1.0);
        assert_eq!(config.idle_eviction_window_ms, 120_000);
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r#"
max_requests_per_minute: 600
burst_capacity: 10
idle_eviction_window_ms: 30000
"#;
        let config = RegistryConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.max_requests_per_minute, 600.0);
        assert_eq!(config.burst_capacity, 10.0);
        assert_eq!(config.idle_eviction_window(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_non_positive_rate() {
        let config = RegistryConfig {
            max_requests_per_minute: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RegistryConfig {
            max_requests_per_minute: -5.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RegistryConfig {
            max_requests_per_minute: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_sub_unit_burst() {
        let config = RegistryConfig {
            burst_capacity: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = RegistryConfig {
            idle_eviction_window_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_invalid_config_is_fatal() {
        let yaml = "max_requests_per_minute: -1";
        assert!(RegistryConfig::from_yaml(yaml).is_err());
    }
}
