//! Dispatcher configuration and logging set-up.
//!
//! [`DispatcherConfig`] deserializes from any serde format; missing fields take their defaults:
//!
//! ```
//! use micro_dispatch::config::DispatcherConfig;
//!
//! let config: DispatcherConfig = serde_json::from_str(r#"{ "dev_mode": true }"#).unwrap();
//! assert!(config.dev_mode);
//! assert_eq!(config.log_level, "info");
//! ```

use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Rebuild the middlewares from their factory on every request.
    pub dev_mode: bool,
    /// Maximum level of the installed subscriber: `trace`, `debug`, `info`, `warn` or `error`.
    pub log_level: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { dev_mode: false, log_level: "info".to_string() }
    }
}

impl DispatcherConfig {
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(self.log_level.trim())
            .map_err(|e| ConfigError::InvalidLogLevel { level: self.log_level.clone(), reason: e.to_string() })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid log level '{level}': {reason}")]
    InvalidLogLevel { level: String, reason: String },

    #[error("failed to install tracing subscriber: {source}")]
    Subscriber {
        #[from]
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}

/// Installs a global fmt subscriber with the configured max level.
///
/// Fails if the level is invalid or a global subscriber is already installed.
pub fn init_tracing(config: &DispatcherConfig) -> Result<(), ConfigError> {
    let level = config.max_level()?;
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
