//! `WebSocket` subscription channel.
//!
//! Clients connect to `GET /subscribe`. Each connection gets its own
//! [`SubscriberQueue`] and runs two flows:
//!
//! - **inbound**: every text (or UTF-8 binary) frame of the shape
//!   `{entity: record}` is applied with [`StateStore::set`].
//! - **outbound**: every queued notification is pushed as a JSON text
//!   frame, including the `{"clearWorld": 1}` sentinel.
//!
//! The flows share fate. Whichever ends first, the other is stopped and the
//! subscriber is removed from the registry. How the session ended is
//! reported as a [`SessionEnd`]; faults are logged and never leave the
//! connection.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{Instrument, debug, info_span, trace, warn};
use worldsync_core::{EntityId, Notification, QueueError, Record, StateStore, SubscriberQueue};

use crate::state::AppState;

/// Why a subscription session stopped.
#[derive(Debug, thiserror::Error)]
pub enum SessionEnd {
    /// The client sent a close frame.
    #[error("client closed the connection")]
    ClientClosed,

    /// The inbound stream ended without a close frame.
    #[error("inbound stream ended")]
    StreamEnded,

    /// An inbound frame was not a `{entity: record}` object.
    #[error("malformed inbound frame: {0}")]
    Malformed(String),

    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    ReceiveFault(axum::Error),

    /// Writing to the socket failed.
    #[error("send failed: {0}")]
    SendFault(axum::Error),

    /// The subscriber queue lost all producers.
    #[error("subscriber queue closed")]
    QueueClosed,

    /// The subscriber exceeded its pending limit.
    #[error("subscriber queue overflowed")]
    Overflowed,

    /// The inbound task panicked or was cancelled.
    #[error("inbound task failed: {0}")]
    TaskFailed(String),
}

impl SessionEnd {
    /// Whether this ending is a genuine fault rather than a normal
    /// disconnect.
    pub const fn is_fault(&self) -> bool {
        !matches!(self, Self::ClientClosed | Self::StreamEnded)
    }
}

/// Upgrade an HTTP request to a subscription `WebSocket`.
///
/// # Route
///
/// `GET /subscribe`
pub async fn subscribe(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_session(socket, state))
}

/// Run one connection from registration to teardown.
async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let queue = state.subscribe();
    let id = queue.id();
    let span = info_span!("subscription", subscriber_id = %id);

    debug!(parent: &span, subscribers = state.registry.len(), "subscriber connected");

    let end = drive_session(socket, Arc::clone(&state.store), queue)
        .instrument(span.clone())
        .await;

    state.unsubscribe(id);

    if end.is_fault() {
        warn!(parent: &span, reason = %end, "subscription ended with fault");
    } else {
        debug!(parent: &span, reason = %end, "subscriber disconnected");
    }
}

/// Run both flows until either ends, then stop the other.
async fn drive_session(
    socket: WebSocket,
    store: Arc<StateStore>,
    queue: SubscriberQueue,
) -> SessionEnd {
    let (sender, receiver) = socket.split();

    let mut inbound = tokio::spawn(read_updates(receiver, store).in_current_span());

    tokio::select! {
        joined = &mut inbound => {
            joined.unwrap_or_else(|e| SessionEnd::TaskFailed(e.to_string()))
        }
        end = push_notifications(sender, queue) => {
            inbound.abort();
            end
        }
    }
}

/// Inbound flow: apply each `{entity: record}` frame as a full replace.
async fn read_updates(mut receiver: SplitStream<WebSocket>, store: Arc<StateStore>) -> SessionEnd {
    while let Some(frame) = receiver.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => return SessionEnd::ReceiveFault(e),
        };

        let payload: &[u8] = match &message {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(data) => data.as_ref(),
            Message::Close(_) => return SessionEnd::ClientClosed,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        match parse_update(payload) {
            Ok((entity, record)) => {
                trace!(entity, "inbound update");
                store.set(entity, record).await;
            }
            Err(reason) => return SessionEnd::Malformed(reason),
        }
    }
    SessionEnd::StreamEnded
}

/// Outbound flow: drain the queue into the socket.
async fn push_notifications(
    mut sender: SplitSink<WebSocket, Message>,
    mut queue: SubscriberQueue,
) -> SessionEnd {
    loop {
        let notification = match queue.get().await {
            Ok(notification) => notification,
            Err(QueueError::Closed) => return SessionEnd::QueueClosed,
            Err(QueueError::Overflowed) => {
                let frame = CloseFrame {
                    code: close_code::POLICY,
                    reason: Utf8Bytes::from_static("subscriber queue overflowed"),
                };
                // The connection is being dropped either way.
                let _ = sender.send(Message::Close(Some(frame))).await;
                return SessionEnd::Overflowed;
            }
        };

        let json = match serde_json::to_string(&notification) {
            Ok(j) => j,
            Err(e) => {
                warn!(entity = %notification.entity, "failed to serialize notification: {e}");
                continue;
            }
        };

        if let Err(e) = sender.send(Message::Text(json.into())).await {
            return SessionEnd::SendFault(e);
        }
    }
}

/// Parse an inbound frame into the entity and its replacement record.
///
/// # Errors
///
/// Returns a description of the problem if the payload is not JSON, not a
/// single-key object, or the value is not an object.
pub fn parse_update(payload: &[u8]) -> Result<(EntityId, Record), String> {
    serde_json::from_slice::<Notification>(payload)
        .map_err(|e| e.to_string())?
        .into_update()
        .map_err(|e| e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_single_entity_update() {
        let (entity, record) = parse_update(br#"{"X1": {"x": 10, "y": 20}}"#).unwrap();
        assert_eq!(entity, "X1");
        assert_eq!(serde_json::Value::Object(record), json!({"x": 10, "y": 20}));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_update(b"hello").is_err());
        assert!(parse_update(br#"{"a": {}, "b": {}}"#).is_err());
        assert!(parse_update(br#"{"a": "scalar"}"#).is_err());
    }

    #[test]
    fn normal_endings_are_not_faults() {
        assert!(!SessionEnd::ClientClosed.is_fault());
        assert!(!SessionEnd::StreamEnded.is_fault());
        assert!(SessionEnd::Malformed(String::from("x")).is_fault());
        assert!(SessionEnd::Overflowed.is_fault());
        assert!(SessionEnd::QueueClosed.is_fault());
    }
}
