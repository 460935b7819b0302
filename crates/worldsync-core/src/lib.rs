//! Shared world state and subscriber fan-out for `WorldSync`.
//!
//! This crate owns the only concurrent part of the system: a mutable world
//! of named JSON entities whose every mutation is pushed to all connected
//! subscribers.
//!
//! # Modules
//!
//! - [`record`] -- Entity, record, world, and notification types.
//! - [`store`] -- [`StateStore`], the single owner of the world.
//! - [`subscriber`] -- Per-connection delivery queues.
//! - [`broadcast`] -- [`SubscriberRegistry`] and the [`Broadcaster`]
//!   listener.
//! - [`config`] -- Configuration loading from `worldsync.yaml`.
//!
//! # Data flow
//!
//! ```text
//! StateStore::set --> Broadcaster --> Subscriber::put (x N) --> SubscriberQueue::get
//! ```

pub mod broadcast;
pub mod config;
pub mod record;
pub mod store;
pub mod subscriber;

pub use broadcast::{Broadcaster, SubscriberRegistry};
pub use config::{ConfigError, WorldSyncConfig};
pub use record::{EntityId, Notification, Record, World, CLEAR_WORLD_SENTINEL};
pub use store::StateStore;
pub use subscriber::{Delivery, QueueError, Subscriber, SubscriberId, SubscriberQueue};
