//! HTTP and `WebSocket` surface for `WorldSync`.
//!
//! This crate provides an Axum server that exposes the shared world held
//! by [`worldsync_core::StateStore`]:
//!
//! - **REST endpoints** to read, merge, replace, and clear entities
//!   (`/entity/{id}`, `/world`, `/clear`)
//! - **`WebSocket` endpoint** (`/subscribe`) that pushes every mutation to
//!   every connected client and applies the updates clients send
//! - **Static files** under `/static`, with `/` redirecting to
//!   `/static/index.html`
//!
//! # Architecture
//!
//! One [`AppState`] is built at startup and shared by every handler and
//! session. Mutations from either surface go through the store, which fans
//! each one out to the per-connection subscriber queues. Sessions drain
//! their own queue, so a slow client never delays a mutation.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{bind, serve_on, shutdown_signal, ServerError};
pub use startup::{spawn_server, ServerHandle, StartupError};
pub use state::AppState;
