//! Fan-out of store mutations to every active subscriber.
//!
//! [`SubscriberRegistry`] is the explicit set of active subscribers. It
//! uses a synchronous lock because it is read from inside store listeners,
//! which run while the store's write guard is held. Removal takes the same
//! lock as fan out, so a removed subscriber never receives a later
//! mutation.
//!
//! [`Broadcaster`] is the listener that turns each `(entity, value)` into a
//! [`Notification`] and enqueues it into every registered subscriber.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace};

use crate::record::Notification;
use crate::store::StateStore;
use crate::subscriber::{Delivery, Subscriber, SubscriberId};

/// The active-subscribers collection.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to the active set.
    pub fn register(&self, subscriber: Subscriber) {
        let mut subscribers = self.subscribers.write();
        let id = subscriber.id();
        subscribers.insert(id, subscriber);
        debug!(subscriber_id = %id, subscribers = subscribers.len(), "subscriber registered");
    }

    /// Remove a subscriber. Returns whether it was present.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let removed = subscribers.remove(&id).is_some();
        debug!(subscriber_id = %id, removed, subscribers = subscribers.len(), "subscriber removed");
        removed
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Number of active subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether there are no active subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Enqueue `notification` into every active subscriber.
    ///
    /// Returns the number of subscribers that accepted it. Closed or
    /// overflowed subscribers are skipped and left for their session to
    /// remove.
    pub fn broadcast(&self, notification: &Notification) -> usize {
        let subscribers = self.subscribers.read();
        let mut queued = 0_usize;
        for subscriber in subscribers.values() {
            match subscriber.put(notification.clone()) {
                Delivery::Queued => queued = queued.saturating_add(1),
                Delivery::Closed => {
                    debug!(subscriber_id = %subscriber.id(), "skipping closed subscriber");
                }
                Delivery::Overflowed => {
                    debug!(subscriber_id = %subscriber.id(), "skipping overflowed subscriber");
                }
            }
        }
        trace!(
            entity = %notification.entity,
            queued,
            subscribers = subscribers.len(),
            "notification fanned out"
        );
        queued
    }
}

/// The store listener that feeds the registry.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub const fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Register a broadcaster for `registry` as a listener of `store`.
    pub fn attach(store: &StateStore, registry: Arc<SubscriberRegistry>) {
        let broadcaster = Self::new(registry);
        store.add_listener(move |entity, value| {
            broadcaster.on_mutation(entity, value);
        });
    }

    /// Fan one mutation out to every subscriber.
    pub fn on_mutation(&self, entity: &str, value: &Value) -> usize {
        self.registry.broadcast(&Notification::new(entity, value.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::record::Record;
    use crate::subscriber::SubscriberQueue;

    fn wired() -> (StateStore, Arc<SubscriberRegistry>) {
        let store = StateStore::new();
        let registry = Arc::new(SubscriberRegistry::new());
        Broadcaster::attach(&store, Arc::clone(&registry));
        (store, registry)
    }

    fn join(registry: &SubscriberRegistry) -> (Subscriber, SubscriberQueue) {
        let (sub, queue) = Subscriber::new(None);
        registry.register(sub.clone());
        (sub, queue)
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[tokio::test]
    async fn every_subscriber_gets_each_mutation_once() {
        let (store, registry) = wired();
        let mut queues: Vec<_> = (0..4).map(|_| join(&registry)).collect();

        store.set("a", record(json!({"x": 1}))).await;
        store.update("b", "y", json!(2)).await;
        store.clear().await;

        let expected = vec![
            Notification::new("a", json!({"x": 1})),
            Notification::new("b", json!({"y": 2})),
            Notification::clear_world(),
        ];
        for (sub, queue) in &mut queues {
            assert_eq!(sub.pending(), 3);
            let mut got = Vec::new();
            for _ in 0..3 {
                got.push(queue.get().await.unwrap());
            }
            assert_eq!(got, expected);
        }
    }

    #[tokio::test]
    async fn removed_subscriber_stops_growing() {
        let (store, registry) = wired();
        let (kept, _kept_queue) = join(&registry);
        let (gone, _gone_queue) = join(&registry);

        store.set("a", Record::new()).await;
        assert!(registry.remove(gone.id()));
        assert!(!registry.contains(gone.id()));

        store.set("a", Record::new()).await;
        store.update("a", "k", json!(true)).await;

        assert_eq!(gone.enqueued_total(), 1);
        assert_eq!(kept.enqueued_total(), 3);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn dead_subscriber_is_tolerated() {
        let (store, registry) = wired();
        let (_alive, mut alive_queue) = join(&registry);
        let (_dead, dead_queue) = join(&registry);
        drop(dead_queue);

        store.set("a", Record::new()).await;

        assert_eq!(alive_queue.get().await.unwrap(), Notification::new("a", json!({})));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn broadcast_counts_accepting_subscribers() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());
        let (_a, _qa) = join(&registry);
        let (_b, qb) = join(&registry);
        drop(qb);
        assert_eq!(registry.broadcast(&Notification::clear_world()), 1);
    }

    #[test]
    fn remove_unknown_is_false() {
        let registry = SubscriberRegistry::new();
        assert!(!registry.remove(SubscriberId::new()));
    }
}
