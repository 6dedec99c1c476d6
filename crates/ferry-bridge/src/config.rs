//! Bridge configuration (`[bridge]` table of a TOML file)
//!
//! ```toml
//! [bridge]
//! module = "shapes"        # Guest module imported by Initialize
//! debug = true             # trace conversions and callbacks on stderr
//! proxy-class = "GuestInstance"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default Host class name for Opaque Reference Proxies
pub const DEFAULT_PROXY_CLASS: &str = "GuestInstance";

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Bridge session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// Guest module imported when the session opens
    pub module: String,

    /// Trace conversions and callbacks on stderr
    #[serde(default)]
    pub debug: bool,

    /// Host class used for Opaque Reference Proxies
    #[serde(default = "default_proxy_class")]
    pub proxy_class: String,
}

fn default_proxy_class() -> String {
    DEFAULT_PROXY_CLASS.to_string()
}

#[derive(Deserialize)]
struct ConfigFile {
    bridge: BridgeConfig,
}

impl BridgeConfig {
    /// Configuration for `module` with defaults for everything else
    pub fn new(module: impl Into<String>, debug: bool) -> Self {
        Self {
            module: module.into(),
            debug,
            proxy_class: default_proxy_class(),
        }
    }

    /// Load the `[bridge]` table from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse the `[bridge]` table from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        file.bridge.validate()?;
        Ok(file.bridge)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module.is_empty() {
            return Err(ConfigError::ValidationError(
                "Module name cannot be empty".to_string(),
            ));
        }
        if !self.module.split('.').all(ferry_guest::is_identifier) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid module name: {}",
                self.module
            )));
        }
        if self.proxy_class.is_empty() {
            return Err(ConfigError::ValidationError(
                "Proxy class name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new("bridge", false)
    }
}
