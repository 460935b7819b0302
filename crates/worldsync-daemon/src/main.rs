//! `WorldSync` server binary.
//!
//! This is the main entry point that wires together configuration,
//! logging, the shared world store, and the HTTP + `WebSocket` server. It
//! runs until `Ctrl-C`, then shuts the server down gracefully.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (the first argument, `WORLDSYNC_CONFIG`, or
//!    `worldsync.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the store, subscriber registry, and broadcaster
//! 4. Bind and spawn the server
//! 5. Wait for `Ctrl-C` and shut down

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use worldsync_core::WorldSyncConfig;
use worldsync_core::config::LoggingConfig;
use worldsync_server::{AppState, shutdown_signal, spawn_server};

use crate::error::DaemonError;

/// Environment variable naming the config file.
const ENV_CONFIG: &str = "WORLDSYNC_CONFIG";

/// Config file used when none is named explicitly.
const DEFAULT_CONFIG_FILE: &str = "worldsync.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let source = ConfigSource::resolve(std::env::args().nth(1), std::env::var(ENV_CONFIG).ok());
    let config = load_config(&source)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;

    info!("worldsync starting");
    info!(
        source = %source.path().display(),
        host = config.server.host,
        port = config.server.port,
        static_dir = config.server.static_dir,
        max_pending = ?config.subscription.max_pending,
        "Configuration loaded"
    );

    // 3. Create the shared world.
    let state = Arc::new(AppState::from_config(&config.subscription));

    // 4. Start the server.
    let handle = spawn_server(&config.server, Arc::clone(&state))
        .await
        .map_err(DaemonError::from)?;
    info!(addr = %handle.addr(), "worldsync ready");

    // 5. Run until interrupted.
    shutdown_signal().await;
    handle.shutdown().await.map_err(DaemonError::from)?;

    info!(
        entities = state.store.len().await,
        subscribers = state.registry.len(),
        "worldsync shutdown complete"
    );

    Ok(())
}

/// Where the configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigSource {
    /// Named on the command line or in the environment; must exist.
    Explicit(PathBuf),
    /// The default file; defaults are used when it is absent.
    Default(PathBuf),
}

impl ConfigSource {
    /// The command-line argument wins over the environment variable.
    fn resolve(arg: Option<String>, env: Option<String>) -> Self {
        arg.or(env)
            .filter(|p| !p.trim().is_empty())
            .map_or_else(
                || Self::Default(PathBuf::from(DEFAULT_CONFIG_FILE)),
                |p| Self::Explicit(PathBuf::from(p)),
            )
    }

    fn path(&self) -> &std::path::Path {
        match self {
            Self::Explicit(path) | Self::Default(path) => path,
        }
    }
}

/// Load configuration from `source`, falling back to defaults when the
/// default file does not exist.
fn load_config(source: &ConfigSource) -> Result<WorldSyncConfig, DaemonError> {
    match source {
        ConfigSource::Default(path) if !path.exists() => Ok(WorldSyncConfig::parse("")?),
        ConfigSource::Explicit(path) | ConfigSource::Default(path) => {
            Ok(WorldSyncConfig::from_file(path)?)
        }
    }
}

/// Build the log filter: `RUST_LOG` if set, otherwise the configured level.
fn log_filter(config: &LoggingConfig) -> Result<EnvFilter, DaemonError> {
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(&config.level).map_err(|e| DaemonError::Logging {
            message: format!("invalid log level {:?}: {e}", config.level),
        })
    })
}

fn init_logging(config: &LoggingConfig) -> Result<(), DaemonError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(config)?)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn argument_wins_over_environment() {
        let source = ConfigSource::resolve(Some("cli.yaml".into()), Some("env.yaml".into()));
        assert_eq!(source, ConfigSource::Explicit(PathBuf::from("cli.yaml")));
    }

    #[test]
    fn environment_used_without_argument() {
        let source = ConfigSource::resolve(None, Some("env.yaml".into()));
        assert_eq!(source, ConfigSource::Explicit(PathBuf::from("env.yaml")));
    }

    #[test]
    fn default_file_when_unnamed() {
        let source = ConfigSource::resolve(None, Some("  ".into()));
        assert_eq!(source, ConfigSource::Default(PathBuf::from(DEFAULT_CONFIG_FILE)));
    }

    #[test]
    fn missing_default_file_uses_defaults() {
        let source = ConfigSource::Default(PathBuf::from("/nonexistent/worldsync.yaml"));
        let config = load_config(&source).unwrap();
        assert_eq!(config.subscription, WorldSyncConfig::default().subscription);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let source = ConfigSource::Explicit(PathBuf::from("/nonexistent/worldsync.yaml"));
        assert!(matches!(load_config(&source), Err(DaemonError::Config { .. })));
    }

    #[test]
    fn configured_level_builds_a_filter() {
        let config = LoggingConfig {
            level: String::from("debug"),
            json: false,
        };
        assert!(log_filter(&config).is_ok());
    }
}
