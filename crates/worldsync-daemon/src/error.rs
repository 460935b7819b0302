//! Error types for the `WorldSync` binary.
//!
//! [`DaemonError`] is the top-level error type that wraps all possible
//! failure modes during startup and shutdown.

/// Top-level error for the `WorldSync` binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: worldsync_core::ConfigError,
    },

    /// The server could not start or stopped with an error.
    #[error("server error: {source}")]
    Server {
        /// The underlying startup error.
        #[from]
        source: worldsync_server::StartupError,
    },

    /// The log filter could not be built.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },
}
