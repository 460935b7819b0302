//! REST endpoint handlers for the `WorldSync` server.
//!
//! Handlers are thin: they validate the body, call into the shared
//! [`StateStore`](worldsync_core::StateStore) and render its result as
//! JSON.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Redirect to `/static/index.html` |
//! | `POST` | `/entity/{id}` | Merge each body field into the entity |
//! | `PUT` | `/entity/{id}` | Replace the entity with the body |
//! | `GET` | `/entity/{id}` | Current entity record (`{}` if absent) |
//! | `GET` | `/world` | Full world snapshot |
//! | `POST` | `/world` | Replace the whole world |
//! | `POST` | `/clear` | Empty the world |

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::response::Redirect;
use serde_json::Value;
use tracing::debug;
use worldsync_core::record::value_kind;
use worldsync_core::{Record, World};

use crate::error::ApiError;
use crate::state::AppState;

/// The only media type accepted for request bodies.
const JSON_MEDIA_TYPE: &str = "application/json";

// ---------------------------------------------------------------------------
// GET / -- redirect to the static client
// ---------------------------------------------------------------------------

/// Send browsers to the bundled client page.
pub async fn index() -> Redirect {
    Redirect::to("/static/index.html")
}

// ---------------------------------------------------------------------------
// /entity/{id}
// ---------------------------------------------------------------------------

/// Merge every field of the body into the entity, one update per field.
///
/// Subscribers receive one notification per field, each carrying the
/// full record at that point.
pub async fn post_entity(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Record>, ApiError> {
    let fields = parse_record(&headers, &body)?;
    debug!(entity, fields = fields.len(), "merging entity fields");
    for (field, value) in fields {
        state.store.update(&entity, field, value).await;
    }
    Ok(Json(state.store.get(&entity).await))
}

/// Replace the entity with the body.
pub async fn put_entity(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Record>, ApiError> {
    let record = parse_record(&headers, &body)?;
    state.store.set(entity.as_str(), record).await;
    Ok(Json(state.store.get(&entity).await))
}

/// Return the entity's record, or `{}` when it does not exist.
pub async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
) -> Json<Record> {
    Json(state.store.get(&entity).await)
}

// ---------------------------------------------------------------------------
// /world
// ---------------------------------------------------------------------------

/// Return every entity in the world.
pub async fn get_world(State(state): State<Arc<AppState>>) -> Json<World> {
    Json(state.store.snapshot().await)
}

/// Replace the whole world with the body, a JSON object of records.
pub async fn post_world(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<World>, ApiError> {
    let world = parse_world(&headers, &body)?;
    state.store.replace(world).await;
    Ok(Json(state.store.snapshot().await))
}

// ---------------------------------------------------------------------------
// POST /clear
// ---------------------------------------------------------------------------

/// Empty the world and return the (empty) snapshot.
pub async fn clear(State(state): State<Arc<AppState>>) -> Json<World> {
    state.store.clear().await;
    Json(state.store.snapshot().await)
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Reject methods a route does not support.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Check the content type and parse the body as a JSON object.
///
/// # Errors
///
/// [`ApiError::InvalidContentType`] unless the media type is
/// `application/json`; [`ApiError::MalformedBody`] if the body is not
/// valid JSON or not an object.
pub fn parse_record(headers: &HeaderMap, body: &[u8]) -> Result<Record, ApiError> {
    require_json(headers)?;
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
    match value {
        Value::Object(record) => Ok(record),
        other => Err(ApiError::MalformedBody(format!(
            "expected a JSON object, got {}",
            value_kind(&other)
        ))),
    }
}

/// Parse a whole-world body: an object whose values are all objects.
///
/// # Errors
///
/// Same as [`parse_record`], plus [`ApiError::MalformedBody`] when an
/// entity maps to a non-object.
pub fn parse_world(headers: &HeaderMap, body: &[u8]) -> Result<World, ApiError> {
    parse_record(headers, body)?
        .into_iter()
        .map(|(entity, value)| match value {
            Value::Object(record) => Ok((entity, record)),
            other => Err(ApiError::MalformedBody(format!(
                "entity {entity} must map to an object, got {}",
                value_kind(&other)
            ))),
        })
        .collect()
}

fn require_json(headers: &HeaderMap) -> Result<(), ApiError> {
    let declared = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let media_type = declared.split(';').next().unwrap_or_default().trim();
    if media_type.eq_ignore_ascii_case(JSON_MEDIA_TYPE) {
        Ok(())
    } else if declared.is_empty() {
        Err(ApiError::InvalidContentType(String::from("none")))
    } else {
        Err(ApiError::InvalidContentType(declared.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;

    fn json_headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    #[test]
    fn accepts_json_with_charset() {
        let headers = json_headers("application/json; charset=utf-8");
        let record = parse_record(&headers, br#"{"x": 1}"#).unwrap();
        assert_eq!(record.get("x"), Some(&json!(1)));
    }

    #[test]
    fn rejects_missing_content_type() {
        let err = parse_record(&HeaderMap::new(), b"{}").unwrap_err();
        assert!(matches!(err, ApiError::InvalidContentType(ref t) if t == "none"));
    }

    #[test]
    fn rejects_form_content_type() {
        let headers = json_headers("application/x-www-form-urlencoded");
        assert!(matches!(
            parse_record(&headers, b"{}"),
            Err(ApiError::InvalidContentType(_))
        ));
    }

    #[test]
    fn rejects_invalid_json() {
        let headers = json_headers("application/json");
        assert!(matches!(
            parse_record(&headers, b"{not json"),
            Err(ApiError::MalformedBody(_))
        ));
        assert!(matches!(parse_record(&headers, b""), Err(ApiError::MalformedBody(_))));
    }

    #[test]
    fn rejects_non_object_json() {
        let headers = json_headers("application/json");
        let err = parse_record(&headers, b"[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "malformed body: expected a JSON object, got array");
    }

    #[test]
    fn world_values_must_be_objects() {
        let headers = json_headers("application/json");
        let world = parse_world(&headers, br#"{"a": {"x": 1}, "b": {}}"#).unwrap();
        assert_eq!(world.len(), 2);

        let err = parse_world(&headers, br#"{"a": 3}"#).unwrap_err();
        assert!(err.to_string().contains("entity a must map to an object"));
    }
}
