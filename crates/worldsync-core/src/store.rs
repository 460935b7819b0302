//! The shared world state store.
//!
//! [`StateStore`] exclusively owns the [`World`] and is the only place it is
//! mutated. Every mutation notifies the registered listeners synchronously,
//! in registration order, while the write guard is still held. A mutation
//! and its fan out are one atomic step: readers never see a half-applied
//! merge and listeners observe the global mutation order.
//!
//! Listeners run on the mutating task and must not block. The
//! [`Broadcaster`](crate::broadcast::Broadcaster) only enqueues.
//!
//! Store operations are total. A missing entity reads as the empty record.

use parking_lot::RwLock as ListenerLock;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::record::{EntityId, Notification, Record, World, CLEAR_WORLD_SENTINEL};

/// Callback invoked after every mutation with `(entity, value)`.
pub type Listener = Box<dyn Fn(&str, &Value) + Send + Sync>;

/// Owner of the world map and its listener list.
pub struct StateStore {
    space: RwLock<World>,
    listeners: ListenerLock<Vec<Listener>>,
}

impl StateStore {
    /// Create an empty store with no listeners.
    pub fn new() -> Self {
        Self {
            space: RwLock::new(World::new()),
            listeners: ListenerLock::new(Vec::new()),
        }
    }

    /// Register a listener. It sees every mutation applied after this call.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write();
        listeners.push(Box::new(listener));
        debug!(listeners = listeners.len(), "listener registered");
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Current record of `entity`, or the empty record if it is absent.
    pub async fn get(&self, entity: &str) -> Record {
        self.space.read().await.get(entity).cloned().unwrap_or_default()
    }

    /// Replace the whole record of `entity`, creating it if needed.
    pub async fn set(&self, entity: impl Into<EntityId>, record: Record) {
        let entity = entity.into();
        let mut space = self.space.write().await;
        let value = Value::Object(record.clone());
        space.insert(entity.clone(), record);
        self.notify(&entity, &value);
    }

    /// Merge one field into `entity`, keeping its other fields.
    ///
    /// A missing entity is created with an empty record first.
    pub async fn update(&self, entity: &str, field: impl Into<String>, value: Value) {
        let mut space = self.space.write().await;
        let record = space.entry(entity.to_owned()).or_default();
        record.insert(field.into(), value);
        let value = Value::Object(record.clone());
        self.notify(entity, &value);
    }

    /// Remove every entity and emit a single `clearWorld` sentinel.
    pub async fn clear(&self) {
        let mut space = self.space.write().await;
        let removed = space.len();
        space.clear();
        debug!(removed, "world cleared");
        let sentinel = Notification::clear_world();
        self.notify(CLEAR_WORLD_SENTINEL, &sentinel.value);
    }

    /// Replace the entire world.
    ///
    /// Listeners see the `clearWorld` sentinel, then one notification per
    /// entity of the new world in identifier order.
    pub async fn replace(&self, world: World) {
        let mut space = self.space.write().await;
        *space = world;
        debug!(entities = space.len(), "world replaced");
        let sentinel = Notification::clear_world();
        self.notify(CLEAR_WORLD_SENTINEL, &sentinel.value);
        for (entity, record) in space.iter() {
            self.notify(entity, &Value::Object(record.clone()));
        }
    }

    /// Copy of the full world.
    pub async fn snapshot(&self) -> World {
        self.space.read().await.clone()
    }

    /// Number of entities currently present.
    pub async fn len(&self) -> usize {
        self.space.read().await.len()
    }

    /// Whether the world holds no entities.
    pub async fn is_empty(&self) -> bool {
        self.space.read().await.is_empty()
    }

    fn notify(&self, entity: &str, value: &Value) {
        let listeners = self.listeners.read();
        trace!(entity, listeners = listeners.len(), "notifying listeners");
        for listener in listeners.iter() {
            listener(entity, value);
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}
