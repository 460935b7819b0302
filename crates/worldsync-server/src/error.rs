//! Error types for the `WorldSync` HTTP layer.
//!
//! [`ApiError`] covers every way a request can be rejected. It converts
//! into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Store
//! operations themselves never fail, so every variant here is a boundary
//! rejection and no mutation has happened when one is returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the request/response layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body was not declared as JSON.
    #[error("expected content type application/json, got {0}")]
    InvalidContentType(String),

    /// The body was declared as JSON but could not be used.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// The route exists but does not accept this method.
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    /// HTTP status for this rejection.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidContentType(_) | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = status.as_u16(), error = %self, "request rejected");

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
