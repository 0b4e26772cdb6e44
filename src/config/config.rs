use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{GatewayConfig, LoggingConfig, RegistryConfig, TransferConfig};

/// Full application configuration, read from a TOML file
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("gateway setting '{0}' is not set")]
    MissingGatewaySetting(&'static str),

    #[error("invalid DIMSE settings: {0}")]
    Dimse(#[from] dimse::DimseError),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

impl Config {
    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate everything a run needs regardless of mode.
    ///
    /// Gateway settings are checked separately by [`Config::validate_gateway`]
    /// so planning works on a machine without a configured peer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transfer.presentation_context().validate()?;

        let registry = &self.registry;
        for (name, value) in [
            ("registry.plan_file", &registry.plan_file),
            ("registry.success_file", &registry.success_file),
            ("registry.error_file", &registry.error_file),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} cannot be empty", name)));
            }
        }
        if registry.plan_file == registry.success_file
            || registry.plan_file == registry.error_file
            || registry.success_file == registry.error_file
        {
            return Err(ConfigError::Invalid(
                "registry files must have distinct names".to_string(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Gateway address and AE titles, required before a session may start
    pub fn validate_gateway(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        self.dimse_config().validate()?;
        Ok(())
    }

    pub fn dimse_config(&self) -> dimse::DimseConfig {
        self.gateway
            .dimse_config(self.transfer.presentation_context())
    }
}
