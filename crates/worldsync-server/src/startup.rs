//! Server startup helper for embedding `WorldSync` in another process.
//!
//! Provides [`spawn_server`] which binds eagerly and then runs the server
//! on a background Tokio task, returning a [`ServerHandle`] that reports
//! the bound address and triggers graceful shutdown.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use worldsync_server::{spawn_server, AppState};
//!
//! let state = Arc::new(AppState::default());
//! let handle = spawn_server(&settings, state).await?;
//! println!("listening on {}", handle.addr());
//! handle.shutdown().await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use worldsync_core::config::ServerSettings;

use crate::server::{bind, serve_on, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning or stopping the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or exited with an error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// The background task panicked or was aborted.
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A server running on a background task.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl ServerHandle {
    /// The address the server is listening on.
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the server to finish.
    ///
    /// # Errors
    ///
    /// Returns the server's own error, or [`StartupError::Join`] if the
    /// task did not complete normally.
    pub async fn shutdown(self) -> Result<(), StartupError> {
        // The receiver is gone only if the server already exited, in which
        // case awaiting the task reports why.
        let _ = self.shutdown.send(());
        self.task.await??;
        Ok(())
    }
}

/// Bind to `settings` and serve on a background task.
///
/// Binding happens before this returns, so address errors surface here
/// rather than inside the task. Port `0` picks an ephemeral port; read it
/// back with [`ServerHandle::addr`].
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the listener cannot be bound.
pub async fn spawn_server(
    settings: &ServerSettings,
    state: Arc<AppState>,
) -> Result<ServerHandle, StartupError> {
    let listener = bind(settings).await?;
    let addr = listener.local_addr().map_err(|e| ServerError::Bind(e.to_string()))?;

    let (shutdown, signal) = oneshot::channel::<()>();
    let static_dir = settings.static_dir.clone();

    let task = tokio::spawn(async move {
        let result = serve_on(listener, state, &static_dir, async {
            let _ = signal.await;
        })
        .await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "WorldSync server exited with error");
        }
        result
    });

    tracing::info!(%addr, "WorldSync server spawned on background task");

    Ok(ServerHandle {
        addr,
        shutdown,
        task,
    })
}
