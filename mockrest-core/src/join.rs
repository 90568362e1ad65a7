//! Join resolution.
//!
//! A [`JoinSpec`] says that an entity's foreign-key field points at entities of another
//! collection. Resolving it attaches the related entity (or, for array-valued keys,
//! the related entities) under an output field. Children filters in a query then test
//! the attached values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    config::IdStrategy,
    entity::{EntityId, lookup},
    error::{MockError, MockResult},
    evaluator::EntityEvaluator,
    query::Expr,
    registry::Registry,
};

/// A foreign-key relation from one collection to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    /// Field of the joining entity holding the related id (or an array of ids).
    pub foreign_key: String,
    /// Collection the related entities live in.
    pub collection: String,
    /// Field the related entity is attached under.
    pub field: String,
}

impl JoinSpec {
    /// Creates a join whose output field is derived from the foreign key.
    ///
    /// `customerId` and `customer_id` attach under `customer`. Keys without such a
    /// suffix attach under the collection name.
    pub fn new(foreign_key: impl Into<String>, collection: impl Into<String>) -> Self {
        let foreign_key = foreign_key.into();
        let collection = collection.into();
        let field = ["Id", "_id", "Ids", "_ids"]
            .iter()
            .find_map(|suffix| {
                foreign_key
                    .strip_suffix(suffix)
                    .filter(|stem| !stem.is_empty())
            })
            .map(str::to_string)
            .unwrap_or_else(|| collection.clone());

        Self { foreign_key, collection, field }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

/// Attaches related entities to entities of one collection.
pub(crate) struct JoinResolver<'a> {
    backend: &'a dyn StoreBackend,
    registry: &'a Registry,
    default_strategy: IdStrategy,
    cache: HashMap<(String, EntityId), Option<Value>>,
}

impl<'a> JoinResolver<'a> {
    pub fn new(backend: &'a dyn StoreBackend, registry: &'a Registry, default_strategy: IdStrategy) -> Self {
        Self {
            backend,
            registry,
            default_strategy,
            cache: HashMap::new(),
        }
    }

    /// Resolves every join of `joins` on every entity.
    pub async fn attach_all(&mut self, entities: &mut [Value], joins: &[JoinSpec]) -> MockResult<()> {
        if joins.is_empty() {
            return Ok(());
        }

        for entity in entities.iter_mut() {
            self.attach(entity, joins).await?;
        }

        Ok(())
    }

    /// Resolves every join of `joins` on one entity.
    ///
    /// A foreign key that is absent, null, or points at nothing leaves the output field
    /// unset. Array keys attach the related entities that exist, in key order.
    pub async fn attach(&mut self, entity: &mut Value, joins: &[JoinSpec]) -> MockResult<()> {
        for join in joins {
            let resolved = match lookup(entity, &join.foreign_key) {
                None | Some(Value::Null) => None,
                Some(Value::Array(keys)) => {
                    let mut related = Vec::with_capacity(keys.len());
                    for key in keys.clone() {
                        if let Some(found) = self.related(join, &key).await? {
                            related.push(found);
                        }
                    }
                    Some(Value::Array(related))
                }
                Some(key) => {
                    let key = key.clone();
                    self.related(join, &key).await?
                }
            };

            if let (Some(resolved), Some(map)) = (resolved, entity.as_object_mut()) {
                map.insert(join.field.clone(), resolved);
            }
        }

        Ok(())
    }

    async fn related(&mut self, join: &JoinSpec, key: &Value) -> MockResult<Option<Value>> {
        let strategy = self
            .registry
            .strategy(&join.collection, self.default_strategy);
        let Ok(id) = EntityId::from_value(key, strategy) else {
            debug!(collection = %join.collection, %key, "foreign key is not a valid id");
            return Ok(None);
        };

        let cache_key = (join.collection.clone(), id);
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let found = match self.backend.get(&join.collection, &cache_key.1).await {
            Ok(found) => found,
            Err(MockError::CollectionNotFound(_)) => {
                debug!(collection = %join.collection, "join source collection missing");
                None
            }
            Err(err) => return Err(err),
        };
        self.cache.insert(cache_key, found.clone());

        Ok(found)
    }
}

/// Whether an entity with joins attached passes every children filter.
///
/// Children filters are keyed by the join output field. An entity whose output field
/// is absent fails the filter.
pub(crate) fn passes_children(entity: &Value, children: &BTreeMap<String, Expr>) -> MockResult<bool> {
    let empty = Map::new();
    let fields = entity.as_object().unwrap_or(&empty);

    for (field, expr) in children {
        let passes = match fields.get(field) {
            Some(joined) => EntityEvaluator::matches_joined(joined, expr)?,
            None => false,
        };
        if !passes {
            return Ok(false);
        }
    }

    Ok(true)
}
