//! `WorldSync` HTTP server lifecycle management.
//!
//! [`bind`] opens the TCP listener described by [`ServerSettings`] and
//! [`serve_on`] runs the Axum server on it until the supplied shutdown
//! future resolves. [`shutdown_signal`] is the `Ctrl-C` future used by the
//! daemon.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use worldsync_core::config::ServerSettings;

use crate::router::build_router;
use crate::state::AppState;

/// Bind a TCP listener on the configured host and port.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or the port
/// cannot be bound.
pub async fn bind(settings: &ServerSettings) -> Result<TcpListener, ServerError> {
    let addr = settings
        .socket_addr()
        .map_err(|e| ServerError::Bind(e.to_string()))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve the router on `listener` until `shutdown` resolves.
///
/// Requests in flight when `shutdown` fires are allowed to finish.
/// Upgraded subscription sockets are not waited for.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve_on<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    static_dir: &str,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state, static_dir);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "WorldSync server listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("WorldSync server stopped");
    Ok(())
}

/// Resolve when the process receives `Ctrl-C`.
///
/// If the signal handler cannot be installed the future never resolves.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
