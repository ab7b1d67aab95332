//! Configuration for the batch poller

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the sweep cycle
///
/// # Examples
///
/// ```
/// use quarry_batch::PollerConfig;
///
/// let config = PollerConfig::default();
/// assert_eq!(config.sweep_interval_secs, 300);
/// assert!(config.orphan_scan);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Seconds between sweeps
    /// Default: 300 (5 minutes)
    pub sweep_interval_secs: u64,

    /// How many recent upstream jobs the orphan scan inspects
    /// Default: 100
    pub orphan_scan_limit: usize,

    /// Whether to look for completed jobs with no local manifest
    /// Default: true
    pub orphan_scan: bool,

    /// Jobs materialized concurrently within one sweep
    /// Default: 1 (sequential)
    pub max_concurrent_jobs: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
            orphan_scan_limit: 100,
            orphan_scan: true,
            max_concurrent_jobs: 1,
        }
    }
}

impl PollerConfig {
    /// Frequent sweeps with parallel materialization
    pub fn aggressive() -> Self {
        Self {
            sweep_interval_secs: 60,
            orphan_scan_limit: 200,
            orphan_scan: true,
            max_concurrent_jobs: 4,
        }
    }

    /// Infrequent sweeps, no orphan scan
    pub fn lenient() -> Self {
        Self {
            sweep_interval_secs: 900,
            orphan_scan_limit: 50,
            orphan_scan: false,
            max_concurrent_jobs: 1,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be greater than 0".to_string());
        }
        if self.max_concurrent_jobs == 0 {
            return Err("max_concurrent_jobs must be greater than 0".to_string());
        }
        if self.orphan_scan && self.orphan_scan_limit == 0 {
            return Err("orphan_scan_limit must be greater than 0 when orphan_scan is enabled".to_string());
        }
        Ok(())
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PollerConfig::default();
        assert_eq!(config.sweep_interval_secs, 300);
        assert_eq!(config.orphan_scan_limit, 100);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert!(PollerConfig::aggressive().sweep_interval() < PollerConfig::default().sweep_interval());
        assert!(!PollerConfig::lenient().orphan_scan);
        assert!(PollerConfig::aggressive().validate().is_ok());
        assert!(PollerConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = PollerConfig {
            max_concurrent_jobs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PollerConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PollerConfig::aggressive();
        let toml_str = config.to_toml().unwrap();
        assert_eq!(PollerConfig::from_toml(&toml_str).unwrap(), config);

        let partial = PollerConfig::from_toml("orphan_scan = false").unwrap();
        assert!(!partial.orphan_scan);
        assert_eq!(partial.sweep_interval_secs, 300);
    }
}
