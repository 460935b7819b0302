//! Shared application state for the `WorldSync` server.
//!
//! [`AppState`] holds the one [`StateStore`] and the active-subscribers
//! [`SubscriberRegistry`], wired together by a [`Broadcaster`] at
//! construction. It is wrapped in [`Arc`] and injected into handlers via
//! Axum's `State` extractor; nothing here is process-global.

use std::num::NonZeroUsize;
use std::sync::Arc;

use worldsync_core::config::SubscriptionConfig;
use worldsync_core::{Broadcaster, StateStore, Subscriber, SubscriberId, SubscriberQueue, SubscriberRegistry};

/// Shared state for the Axum application.
#[derive(Debug)]
pub struct AppState {
    /// The world store.
    pub store: Arc<StateStore>,
    /// Subscribers currently connected to `/subscribe`.
    pub registry: Arc<SubscriberRegistry>,
    /// Per-subscriber pending limit (`None` is unbounded).
    pub max_pending: Option<NonZeroUsize>,
}

impl AppState {
    /// Create a fresh store and registry with the broadcaster attached.
    pub fn new(max_pending: Option<NonZeroUsize>) -> Self {
        let store = Arc::new(StateStore::new());
        let registry = Arc::new(SubscriberRegistry::new());
        Broadcaster::attach(&store, Arc::clone(&registry));
        Self {
            store,
            registry,
            max_pending,
        }
    }

    /// Create application state from the `subscription` config section.
    pub fn from_config(config: &SubscriptionConfig) -> Self {
        Self::new(config.max_pending)
    }

    /// Register a new subscriber and return its queue.
    ///
    /// The subscriber sees every mutation applied after this call.
    pub fn subscribe(&self) -> SubscriberQueue {
        let (subscriber, queue) = Subscriber::new(self.max_pending);
        self.registry.register(subscriber);
        queue
    }

    /// Remove a subscriber from the active set.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.remove(id)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use worldsync_core::{Notification, Record};

    use super::*;

    #[tokio::test]
    async fn subscribe_receives_store_mutations() {
        let state = AppState::default();
        let mut queue = state.subscribe();
        state.store.update("a", "x", json!(1)).await;
        assert_eq!(queue.get().await.unwrap(), Notification::new("a", json!({"x": 1})));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let state = AppState::default();
        let queue = state.subscribe();
        assert_eq!(state.registry.len(), 1);
        assert!(state.unsubscribe(queue.id()));
        state.store.set("a", Record::new()).await;
        assert_eq!(queue.pending(), 0);
        assert!(state.registry.is_empty());
    }

    #[test]
    fn from_config_carries_limit() {
        let config = SubscriptionConfig {
            max_pending: NonZeroUsize::new(8),
        };
        assert_eq!(AppState::from_config(&config).max_pending, NonZeroUsize::new(8));
    }
}
