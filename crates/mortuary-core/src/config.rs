//! Engine configuration
//!
//! Values come from defaults, then an optional TOML file, then `MORTUARY_*`
//! environment variables, and are validated once at the end.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{MortuaryError, Result};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "MORTUARY_";

/// Default occupancy alert threshold, in percent
pub const DEFAULT_OCCUPANCY_ALERT_THRESHOLD_PERCENT: f64 = 70.0;

/// Default duplicate custody transfer window, in seconds
pub const DEFAULT_DUPLICATE_TRANSFER_WINDOW_SECS: u64 = 300;

/// Upper bound for the duplicate custody transfer window (one day)
pub const MAX_DUPLICATE_TRANSFER_WINDOW_SECS: u64 = 86_400;

/// Trait for configuration validation
pub trait ConfigValidation {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;
}

/// Trait for configuration merging
pub trait ConfigMerge {
    /// Merge this configuration with another
    fn merge_with(&mut self, other: &Self) -> Result<()>;
}

/// Tunables for the engine components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MortuaryConfig {
    /// Occupancy alert fires when occupancy strictly exceeds this percentage
    pub occupancy_alert_threshold_percent: f64,
    /// Re-scan window for the duplicate custody transfer guard
    pub duplicate_transfer_window_secs: u64,
    /// Publish staged notifications once a command has committed
    pub notifications_enabled: bool,
}

impl Default for MortuaryConfig {
    fn default() -> Self {
        Self {
            occupancy_alert_threshold_percent: DEFAULT_OCCUPANCY_ALERT_THRESHOLD_PERCENT,
            duplicate_transfer_window_secs: DEFAULT_DUPLICATE_TRANSFER_WINDOW_SECS,
            notifications_enabled: true,
        }
    }
}

impl MortuaryConfig {
    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MortuaryError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MortuaryError::config(format!("Invalid TOML: {e}")))
    }

    /// Defaults, then the optional file, then the process environment; validated
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env()?;
        config.validate()?;
        tracing::debug!(
            threshold = config.occupancy_alert_threshold_percent,
            window_secs = config.duplicate_transfer_window_secs,
            notifications = config.notifications_enabled,
            "Loaded mortuary configuration"
        );
        Ok(config)
    }

    /// Merge `MORTUARY_*` variables from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge `MORTUARY_*` pairs, e.g. `MORTUARY_DUPLICATE_TRANSFER_WINDOW_SECS=120`
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.as_ref().strip_prefix(ENV_PREFIX) {
                self.set_from_string(&config_key.to_lowercase(), value.as_ref())?;
            }
        }
        Ok(())
    }

    /// Set a single value by key name
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "occupancy_alert_threshold_percent" => {
                self.occupancy_alert_threshold_percent = value.parse().map_err(|_| {
                    MortuaryError::config(format!("{key} expects a number, got '{value}'"))
                })?;
            }
            "duplicate_transfer_window_secs" => {
                self.duplicate_transfer_window_secs = value.parse().map_err(|_| {
                    MortuaryError::config(format!("{key} expects seconds, got '{value}'"))
                })?;
            }
            "notifications_enabled" => {
                self.notifications_enabled = value.parse().map_err(|_| {
                    MortuaryError::config(format!("{key} expects true/false, got '{value}'"))
                })?;
            }
            _ => {
                tracing::warn!(key, "Ignoring unknown configuration key");
            }
        }
        Ok(())
    }

    /// Duplicate transfer window as a duration
    pub fn duplicate_transfer_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_transfer_window_secs)
    }
}

impl ConfigMerge for MortuaryConfig {
    /// Non-default values in `other` win
    fn merge_with(&mut self, other: &Self) -> Result<()> {
        let defaults = Self::default();
        if other.occupancy_alert_threshold_percent != defaults.occupancy_alert_threshold_percent {
            self.occupancy_alert_threshold_percent = other.occupancy_alert_threshold_percent;
        }
        if other.duplicate_transfer_window_secs != defaults.duplicate_transfer_window_secs {
            self.duplicate_transfer_window_secs = other.duplicate_transfer_window_secs;
        }
        if other.notifications_enabled != defaults.notifications_enabled {
            self.notifications_enabled = other.notifications_enabled;
        }
        Ok(())
    }
}

impl ConfigValidation for MortuaryConfig {
    fn validate(&self) -> Result<()> {
        let threshold = self.occupancy_alert_threshold_percent;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 100.0 {
            return Err(MortuaryError::config(format!(
                "occupancy_alert_threshold_percent must be in (0, 100], got {threshold}"
            )));
        }
        let window = self.duplicate_transfer_window_secs;
        if window == 0 || window > MAX_DUPLICATE_TRANSFER_WINDOW_SECS {
            return Err(MortuaryError::config(format!(
                "duplicate_transfer_window_secs must be in 1..={MAX_DUPLICATE_TRANSFER_WINDOW_SECS}, got {window}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MortuaryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.occupancy_alert_threshold_percent, 70.0);
        assert_eq!(config.duplicate_transfer_window(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MortuaryConfig::from_toml_str("duplicate_transfer_window_secs = 60\n").unwrap();
        assert_eq!(config.duplicate_transfer_window_secs, 60);
        assert_eq!(config.occupancy_alert_threshold_percent, 70.0);
        assert!(config.notifications_enabled);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "occupancy_alert_threshold_percent = 85.5").unwrap();
        writeln!(file, "notifications_enabled = false").unwrap();
        let config = MortuaryConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.occupancy_alert_threshold_percent, 85.5);
        assert!(!config.notifications_enabled);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = MortuaryConfig::default();
        config
            .merge_with_vars([
                ("MORTUARY_DUPLICATE_TRANSFER_WINDOW_SECS", "120"),
                ("MORTUARY_NOTIFICATIONS_ENABLED", "false"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.duplicate_transfer_window_secs, 120);
        assert!(!config.notifications_enabled);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = MortuaryConfig::default();
        let err = config
            .merge_with_vars([("MORTUARY_OCCUPANCY_ALERT_THRESHOLD_PERCENT", "lots")])
            .unwrap_err();
        assert!(matches!(err, MortuaryError::Config { .. }));
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut config = MortuaryConfig::default();
        config.occupancy_alert_threshold_percent = 0.0;
        assert!(config.validate().is_err());
        config.occupancy_alert_threshold_percent = 100.0;
        assert!(config.validate().is_ok());
        config.duplicate_transfer_window_secs = 0;
        assert!(config.validate().is_err());
        config.duplicate_transfer_window_secs = MAX_DUPLICATE_TRANSFER_WINDOW_SECS;
        assert!(config.validate().is_ok());
        config.duplicate_transfer_window_secs = MAX_DUPLICATE_TRANSFER_WINDOW_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_window_from_env_is_rejected() {
        let mut config = MortuaryConfig::default();
        let err = config
            .merge_with_vars([(
                "MORTUARY_DUPLICATE_TRANSFER_WINDOW_SECS",
                "18446744073709551615",
            )])
            .and_then(|()| config.validate())
            .unwrap_err();
        assert!(matches!(err, MortuaryError::Config { .. }));
    }

    #[test]
    fn test_merge_prefers_non_default_values() {
        let mut base = MortuaryConfig::default();
        let other = MortuaryConfig {
            duplicate_transfer_window_secs: 30,
            ..MortuaryConfig::default()
        };
        base.merge_with(&other).unwrap();
        assert_eq!(base.duplicate_transfer_window_secs, 30);
        assert_eq!(base.occupancy_alert_threshold_percent, 70.0);
    }
}
