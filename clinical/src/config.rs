//! Configuration for the clinical workflow.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::resolver::DEFAULT_THRESHOLD_HOURS;

/// Settings shared by the State Store, resolver and Session Manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalConfig {
    /// Hours an optimization stays fresh before maintenance is due
    pub threshold_hours: f64,
    /// Idle time after which a session is evicted (seconds)
    pub session_ttl_secs: u64,
    /// How often expired sessions are swept (seconds)
    pub session_cleanup_interval_secs: u64,
    /// Location of the durable state file
    pub state_path: PathBuf,
}

impl Default for ClinicalConfig {
    fn default() -> Self {
        Self {
            threshold_hours: DEFAULT_THRESHOLD_HOURS,
            session_ttl_secs: 24 * 3600,
            session_cleanup_interval_secs: 60,
            state_path: PathBuf::from("state/system_state.json"),
        }
    }
}

impl ClinicalConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session_cleanup_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.threshold_hours.is_finite() || self.threshold_hours <= 0.0 {
            return Err(format!(
                "threshold_hours must be a positive number, got {}",
                self.threshold_hours
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err("session_ttl_secs must be greater than zero".to_string());
        }
        if self.session_cleanup_interval_secs == 0 {
            return Err("session_cleanup_interval_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClinicalConfig::default();
        assert_eq!(config.threshold_hours, 72.0);
        assert_eq!(config.session_ttl(), Duration::from_secs(86_400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ClinicalConfig::from_yaml("threshold_hours: 48\n").unwrap();
        assert_eq!(config.threshold_hours, 48.0);
        assert_eq!(config.session_ttl_secs, 86_400);
        assert_eq!(config.state_path, PathBuf::from("state/system_state.json"));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = ClinicalConfig {
            threshold_hours: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClinicalConfig {
            threshold_hours: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
