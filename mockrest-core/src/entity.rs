//! Entity identifiers and typed access to stored entities.
//!
//! Entities are JSON objects carrying an `id` field. The engine never looks inside an
//! entity beyond that field, so the whole crate works on `serde_json::Value`.
//! [`EntityId`] is the canonical, ordered form of an id, and [`Resource`] lets callers
//! read and write entities as their own Rust types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, from_value, to_value};
use std::{cmp::Ordering, fmt};

use crate::{
    config::IdStrategy,
    error::{MockError, MockResult},
};

/// Name of the identifier field every entity carries.
pub const ID_FIELD: &str = "id";

/// Canonical entity identifier.
///
/// Numeric ids sort before textual ids, and each kind sorts naturally within itself.
/// This is the order both backends iterate in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityId {
    /// Integer id, used by the `autoincrement` strategy.
    Number(i64),
    /// Textual id, used by the `provided` and `uuid` strategies.
    Text(String),
}

impl EntityId {
    /// Reads an id from a JSON value, coercing it to the kind the strategy uses.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::InvalidBody`] if the value cannot be an id (objects, arrays,
    /// fractional numbers, or non-numeric text under `autoincrement`).
    pub fn from_value(value: &Value, strategy: IdStrategy) -> MockResult<Self> {
        match (value, strategy) {
            (Value::Number(n), IdStrategy::Autoincrement) => n
                .as_i64()
                .map(EntityId::Number)
                .ok_or_else(|| MockError::InvalidBody(format!("id {n} is not an integer"))),
            (Value::String(s), IdStrategy::Autoincrement) => s
                .parse::<i64>()
                .map(EntityId::Number)
                .map_err(|_| MockError::InvalidBody(format!("id '{s}' is not an integer"))),
            (Value::Number(n), _) => Ok(EntityId::Text(n.to_string())),
            (Value::String(s), _) => Ok(EntityId::Text(s.clone())),
            (Value::Bool(b), _) => Ok(EntityId::Text(b.to_string())),
            _ => Err(MockError::InvalidBody(format!("{value} cannot be used as an id"))),
        }
    }

    /// Parses an id taken from a URL segment.
    pub fn from_segment(segment: &str, strategy: IdStrategy) -> MockResult<Self> {
        EntityId::from_value(&Value::String(segment.to_string()), strategy)
    }

    /// Reads the `id` field of an entity, if present and not null.
    pub fn of(entity: &Value, strategy: IdStrategy) -> MockResult<Option<Self>> {
        match entity.get(ID_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => EntityId::from_value(value, strategy).map(Some),
        }
    }

    /// The JSON form written into an entity's `id` field.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Number(n) => Value::from(*n),
            EntityId::Text(s) => Value::String(s.clone()),
        }
    }

    /// Returns the numeric id, if this is one.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            EntityId::Number(n) => Some(*n),
            EntityId::Text(_) => None,
        }
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (EntityId::Number(a), EntityId::Number(b)) => a.cmp(b),
            (EntityId::Number(_), EntityId::Text(_)) => Ordering::Less,
            (EntityId::Text(_), EntityId::Number(_)) => Ordering::Greater,
            (EntityId::Text(a), EntityId::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{n}"),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

/// Returns the object map of an entity, rejecting anything that is not a JSON object.
pub fn as_object<'a>(entity: &'a Value, collection: &str) -> MockResult<&'a Map<String, Value>> {
    entity
        .as_object()
        .ok_or_else(|| MockError::InvalidBody(format!("entity for {collection} must be a JSON object")))
}

/// Writes `id` into an entity, replacing whatever was there.
pub fn stamp_id(entity: &mut Value, id: &EntityId) {
    if let Some(map) = entity.as_object_mut() {
        map.insert(ID_FIELD.to_string(), id.to_value());
    }
}

/// Shallow merge: fields of `patch` overwrite fields of `base`.
pub fn merge(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            let mut merged = base.clone();
            for (key, value) in patch {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

/// Looks up a possibly dotted field path (`address.city`) inside an entity.
pub fn lookup<'a>(entity: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(entity, |current, segment| current.as_object()?.get(segment))
}

/// A Rust type stored as an entity in a named collection.
///
/// # Example
///
/// ```ignore
/// use mockrest::entity::Resource;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Customer {
///     pub id: i64,
///     pub name: String,
/// }
///
/// impl Resource for Customer {
///     fn collection_name() -> &'static str {
///         "customers"
///     }
/// }
/// ```
pub trait Resource: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this type belongs to.
    fn collection_name() -> &'static str;
}

/// Conversion helpers between a [`Resource`] and its JSON entity form.
///
/// Automatically implemented for every [`Resource`].
pub trait ResourceExt: Resource {
    /// Converts this value to an entity.
    fn to_entity(&self) -> MockResult<Value>;

    /// Creates a value from an entity.
    fn from_entity(entity: Value) -> MockResult<Self>;
}

impl<R: Resource> ResourceExt for R {
    fn to_entity(&self) -> MockResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_entity(entity: Value) -> MockResult<Self> {
        Ok(from_value(entity)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_sort_before_text() {
        let mut ids = vec![
            EntityId::Text("b".into()),
            EntityId::Number(10),
            EntityId::Text("a".into()),
            EntityId::Number(2),
        ];
        ids.sort();

        assert_eq!(
            ids,
            vec![
                EntityId::Number(2),
                EntityId::Number(10),
                EntityId::Text("a".into()),
                EntityId::Text("b".into()),
            ]
        );
    }

    #[test]
    fn segment_ids_follow_strategy() {
        assert_eq!(
            EntityId::from_segment("5", IdStrategy::Autoincrement).unwrap(),
            EntityId::Number(5)
        );
        assert_eq!(
            EntityId::from_segment("5", IdStrategy::Provided).unwrap(),
            EntityId::Text("5".into())
        );
        assert!(EntityId::from_segment("abc", IdStrategy::Autoincrement).is_err());
    }

    #[test]
    fn null_id_counts_as_absent() {
        let entity = json!({ "id": null, "name": "x" });
        assert_eq!(EntityId::of(&entity, IdStrategy::Autoincrement).unwrap(), None);
    }

    #[test]
    fn merge_overwrites_and_keeps() {
        let merged = merge(&json!({ "id": 1, "a": 1, "b": 2 }), &json!({ "b": 3, "c": 4 }));
        assert_eq!(merged, json!({ "id": 1, "a": 1, "b": 3, "c": 4 }));
    }

    #[test]
    fn lookup_walks_dotted_paths() {
        let entity = json!({ "address": { "city": "Lyon" } });
        assert_eq!(lookup(&entity, "address.city"), Some(&json!("Lyon")));
        assert_eq!(lookup(&entity, "address.zip"), None);
    }
}
