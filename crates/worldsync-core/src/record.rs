//! Entity records, the world map, and the notification wire shape.
//!
//! An entity is a free-form JSON object keyed by a string identifier. No
//! schema is enforced: field values may be any JSON value. A [`World`] is
//! the full mapping from identifier to record.
//!
//! Every mutation produces one [`Notification`], serialized as the
//! single-key object `{entity: value}`. Clearing the world produces the
//! out-of-band `{"clearWorld": 1}` sentinel instead of a real entity.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Identifier of an entity in the world.
pub type EntityId = String;

/// The data record of a single entity: an unordered field map.
pub type Record = Map<String, Value>;

/// The complete set of entities, ordered by identifier.
pub type World = BTreeMap<EntityId, Record>;

/// Entity name of the sentinel emitted when the world is cleared.
pub const CLEAR_WORLD_SENTINEL: &str = "clearWorld";

/// A single-entity change pushed to subscribers.
///
/// `value` is the full post-mutation record of `entity`, or the number
/// `1` for the [`CLEAR_WORLD_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Notification {
    /// The entity that changed.
    pub entity: EntityId,
    /// Its current value.
    pub value: Value,
}

impl Notification {
    /// Build a notification carrying the full record of `entity`.
    pub fn new(entity: impl Into<EntityId>, value: Value) -> Self {
        Self {
            entity: entity.into(),
            value,
        }
    }

    /// Build the `{"clearWorld": 1}` sentinel.
    pub fn clear_world() -> Self {
        Self::new(CLEAR_WORLD_SENTINEL, Value::from(1))
    }

    /// Whether this is the clear sentinel rather than a real entity.
    pub fn is_clear_world(&self) -> bool {
        self.entity == CLEAR_WORLD_SENTINEL
    }

    /// Split an inbound update into `(entity, record)`.
    ///
    /// Inbound updates replace a whole record, so the value must be an
    /// object.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationShapeError::NotARecord`] for any other value.
    pub fn into_update(self) -> Result<(EntityId, Record), NotificationShapeError> {
        match self.value {
            Value::Object(record) => Ok((self.entity, record)),
            other => Err(NotificationShapeError::NotARecord {
                entity: self.entity,
                kind: value_kind(&other),
            }),
        }
    }
}

impl Serialize for Notification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.entity, &self.value)?;
        map.end()
    }
}

impl TryFrom<Map<String, Value>> for Notification {
    type Error = NotificationShapeError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(NotificationShapeError::KeyCount(map.len()));
        }
        map.into_iter()
            .next()
            .map(|(entity, value)| Self { entity, value })
            .ok_or(NotificationShapeError::KeyCount(0))
    }
}

/// A JSON payload did not have the `{entity: record}` shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationShapeError {
    /// The object did not contain exactly one entity key.
    #[error("expected exactly one entity key, found {0}")]
    KeyCount(usize),

    /// The entity value was not a JSON object.
    #[error("entity {entity} must map to an object, got {kind}")]
    NotARecord {
        /// The offending entity.
        entity: EntityId,
        /// JSON type name of the value that was supplied.
        kind: &'static str,
    },
}

/// Short JSON type name used in error messages.
pub const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
