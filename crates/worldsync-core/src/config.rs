//! Configuration loading and typed config structures for `WorldSync`.
//!
//! The configuration lives in a YAML file (`worldsync.yaml` by default).
//! This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads the file and applies
//! environment overrides. Every field has a default, so an empty or
//! missing file yields a working configuration.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::Deserialize;

/// Environment variable overriding `server.host`.
pub const ENV_HOST: &str = "WORLDSYNC_HOST";

/// Environment variable overriding `server.port`.
pub const ENV_PORT: &str = "WORLDSYNC_PORT";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value for {name}: {reason}")]
    InvalidEnv {
        /// The variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configured bind address is not a socket address.
    #[error("invalid bind address {addr}: {reason}")]
    InvalidAddress {
        /// The `host:port` string that failed to parse.
        addr: String,
        /// The parser's message.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level `WorldSync` configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorldSyncConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Subscription channel settings.
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorldSyncConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `WORLDSYNC_HOST` overrides `server.host`
    /// - `WORLDSYNC_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidEnv`] if an override is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_yaml(yaml)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without consulting the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if `WORLDSYNC_PORT` is not a
    /// valid port number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                name: ENV_PORT,
                reason: format!("{port:?}: {e}"),
            })?;
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// The host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl ServerSettings {
    /// Resolve `host:port` into a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if the pair does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddress {
            reason: e.to_string(),
            addr,
        })
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Subscription channel settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubscriptionConfig {
    /// Maximum undelivered notifications per subscriber before it is
    /// disconnected. Absent means unbounded.
    #[serde(default)]
    pub max_pending: Option<NonZeroUsize>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8000
}

fn default_static_dir() -> String {
    String::from("static")
}

fn default_log_level() -> String {
    String::from("info")
}
