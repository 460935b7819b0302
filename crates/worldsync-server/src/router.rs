//! Axum router construction for the `WorldSync` server.
//!
//! Assembles all routes (REST + `WebSocket` + static files) into a single
//! [`Router`] with CORS middleware enabled for cross-origin clients.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- redirect to `/static/index.html`
/// - `GET|POST|PUT /entity/{id}` -- read, merge, or replace one entity
/// - `GET|POST /world` -- snapshot or replace the whole world
/// - `POST /clear` -- empty the world
/// - `GET /subscribe` -- `WebSocket` subscription channel
/// - `/static/*` -- files from `static_dir`
///
/// Any other method on the API routes is answered with `405`.
pub fn build_router(state: Arc<AppState>, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/entity/{id}",
            get(handlers::get_entity)
                .post(handlers::post_entity)
                .put(handlers::put_entity)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/world",
            get(handlers::get_world)
                .post(handlers::post_world)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/clear",
            post(handlers::clear).fallback(handlers::method_not_allowed),
        )
        .route("/subscribe", get(ws::subscribe))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
