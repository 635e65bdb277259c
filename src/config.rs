//! Server configuration, passed explicitly into [`Engine::listen`](crate::Engine::listen).
//!
//! Nothing here is read implicitly. [`Config::from_env`] is the one place that
//! looks at environment variables, and only when the caller asks for it.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Port used when neither the caller nor `PORT` supplies one.
pub const DEFAULT_PORT: u16 = 8080;

/// Grace period for open connections once shutdown starts.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Errors produced while resolving configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var} value {value:?}: expected a port number")]
    InvalidPort { var: &'static str, value: String },
}

/// Options for serving an [`Engine`](crate::Engine).
///
/// All fields have defaults, so a partial document deserializes:
///
/// ```rust
/// use rapidroute::config::Config;
///
/// let config: Config = serde_json::from_str(r#"{ "port": 3000 }"#).unwrap();
/// assert_eq!(config.address(), "0.0.0.0:3000");
/// assert_eq!(config.not_found_message, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface to bind.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Fixed body for 404 responses; `None` keeps the default body.
    pub not_found_message: Option<String>,
    /// Seconds graceful shutdown waits for open connections.
    pub shutdown_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: DEFAULT_PORT,
            not_found_message: None,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Builds a config from `PORT` and `NOT_FOUND_MESSAGE`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPort`] if `PORT` is set but not a `u16`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        match lookup("PORT") {
            Some(value) if !value.is_empty() => {
                config.port = value.parse().map_err(|_| ConfigError::InvalidPort {
                    var: "PORT",
                    value: value.clone(),
                })?;
            }
            _ => tracing::info!(port = DEFAULT_PORT, "PORT not set, using default"),
        }
        config.not_found_message = lookup("NOT_FOUND_MESSAGE").filter(|m| !m.is_empty());
        Ok(config)
    }

    /// Overrides the listen port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the fixed 404 body.
    #[must_use]
    pub fn not_found_message(mut self, message: impl Into<String>) -> Self {
        self.not_found_message = Some(message.into());
        self
    }

    /// Sets the graceful-shutdown grace period.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_secs = timeout.as_secs();
        self
    }

    /// Returns the graceful-shutdown grace period.
    pub fn shutdown_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Returns `host:port` for binding.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
