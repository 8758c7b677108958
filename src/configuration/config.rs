use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::types::NetProfile;
use crate::error_handling::types::ConfigError;

/// On-disk configuration, loaded from an optional TOML profile file.
///
/// Everything defaults to the stock firmware ports, so a profile file is only
/// needed when the deployment diverges from them:
///
/// ```toml
/// [net]
/// data_port = 51001
/// resend_interval_ms = 500
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub net: NetProfile,
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.net.resend_interval_ms == 0 {
            return Err(ConfigError::BadResendInterval(
                "resend_interval_ms must be greater than zero".into(),
            ));
        }
        if self.net.discovery_timeout_secs == 0 {
            return Err(ConfigError::BadDiscoveryTimeout(
                "discovery_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
