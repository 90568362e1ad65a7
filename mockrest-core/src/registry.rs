//! Per-collection behavior.
//!
//! A [`Registry`] maps collection names to a [`CollectionBehavior`]: id strategy, custom
//! filters and comparators, transform hooks, joins, interceptors, URL rewrites and POST
//! remaps. Collections without an entry behave with engine defaults.
//!
//! ```ignore
//! let registry = Registry::builder()
//!     .collection(
//!         "customers",
//!         CollectionBehavior::builder()
//!             .id_strategy(IdStrategy::Uuid)
//!             .operator("age", FieldOp::Ge)
//!             .join(JoinSpec::new("addressId", "addresses"))
//!             .build(),
//!     )
//!     .build();
//! ```

use std::{collections::HashMap, sync::LazyLock};

use serde_json::Value;

use crate::{
    config::{IdStrategy, PostRemap},
    join::JoinSpec,
    query::{FieldComparator, FieldOp, FieldPredicate},
    router::Interceptor,
    transform::{Transform, Transforms},
};

static DEFAULT_BEHAVIOR: LazyLock<CollectionBehavior> = LazyLock::new(CollectionBehavior::default);

/// A registered filter for one field, replacing the default term match.
#[derive(Debug, Clone)]
pub enum FieldFilter {
    /// Custom predicate over the field value and the raw query literal.
    Predicate(FieldPredicate),
    /// The query literal is parsed as a typed value and compared with `op`.
    Operator(FieldOp),
}

/// Everything the engine knows about one collection beyond its stored entities.
#[derive(Debug, Clone, Default)]
pub struct CollectionBehavior {
    /// Overrides the engine-wide id strategy.
    pub id_strategy: Option<IdStrategy>,
    pub filters: HashMap<String, FieldFilter>,
    pub comparators: HashMap<String, FieldComparator>,
    pub transforms: Transforms,
    pub joins: Vec<JoinSpec>,
    pub interceptors: Vec<Interceptor>,
    /// URL segment rewrites applied after the engine-wide ones.
    pub segment_replacements: HashMap<String, String>,
    /// POST remaps checked before the engine-wide ones.
    pub post_remaps: Vec<PostRemap>,
}

impl CollectionBehavior {
    pub fn builder() -> CollectionBehaviorBuilder {
        CollectionBehaviorBuilder::default()
    }

    /// Returns the join whose output field is `field`.
    pub fn join_for_field(&self, field: &str) -> Option<&JoinSpec> {
        self.joins.iter().find(|join| join.field == field)
    }
}

/// Fluent builder for [`CollectionBehavior`].
#[derive(Debug, Default)]
pub struct CollectionBehaviorBuilder {
    behavior: CollectionBehavior,
}

impl CollectionBehaviorBuilder {
    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.behavior.id_strategy = Some(strategy);
        self
    }

    /// Registers a predicate filter for `field`.
    ///
    /// The predicate receives the field value (if present) and the raw query literal.
    pub fn filter<F>(mut self, field: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&Value>, &str) -> bool + Send + Sync + 'static,
    {
        self.behavior
            .filters
            .insert(field.into(), FieldFilter::Predicate(FieldPredicate::new(predicate)));
        self
    }

    /// Registers a comparison operator for `field` (`?age=30` then means `age >= 30` for `FieldOp::Ge`).
    pub fn operator(mut self, field: impl Into<String>, op: FieldOp) -> Self {
        self.behavior
            .filters
            .insert(field.into(), FieldFilter::Operator(op));
        self
    }

    /// Registers an ordering comparator for `field`.
    pub fn comparator<F>(mut self, field: impl Into<String>, comparator: F) -> Self
    where
        F: Fn(&Value, &Value, bool) -> std::cmp::Ordering + Send + Sync + 'static,
    {
        self.behavior
            .comparators
            .insert(field.into(), FieldComparator::new(comparator));
        self
    }

    pub fn post_create(mut self, transform: Transform) -> Self {
        self.behavior.transforms.post_create = Some(transform);
        self
    }

    pub fn pre_update(mut self, transform: Transform) -> Self {
        self.behavior.transforms.pre_update = Some(transform);
        self
    }

    pub fn get_by_id(mut self, transform: Transform) -> Self {
        self.behavior.transforms.get_by_id = Some(transform);
        self
    }

    pub fn get_all(mut self, transform: Transform) -> Self {
        self.behavior.transforms.get_all = Some(transform);
        self
    }

    pub fn join(mut self, join: JoinSpec) -> Self {
        self.behavior.joins.push(join);
        self
    }

    pub fn interceptor(mut self, interceptor: Interceptor) -> Self {
        self.behavior.interceptors.push(interceptor);
        self
    }

    pub fn segment_replacement(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.behavior
            .segment_replacements
            .insert(from.into(), to.into());
        self
    }

    pub fn post_remap(mut self, remap: PostRemap) -> Self {
        self.behavior.post_remaps.push(remap);
        self
    }

    pub fn build(self) -> CollectionBehavior {
        self.behavior
    }
}

/// Collection name to behavior lookup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    collections: HashMap<String, CollectionBehavior>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The behavior of `collection`, or the defaults if none was registered.
    pub fn behavior(&self, collection: &str) -> &CollectionBehavior {
        self.collections
            .get(collection)
            .unwrap_or(&DEFAULT_BEHAVIOR)
    }

    /// The id strategy of `collection`, falling back to `default`.
    pub fn strategy(&self, collection: &str, default: IdStrategy) -> IdStrategy {
        self.behavior(collection)
            .id_strategy
            .unwrap_or(default)
    }

    pub fn register(&mut self, collection: impl Into<String>, behavior: CollectionBehavior) {
        self.collections.insert(collection.into(), behavior);
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn collection(mut self, name: impl Into<String>, behavior: CollectionBehavior) -> Self {
        self.registry.register(name, behavior);
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_collections_use_defaults() {
        let registry = Registry::builder()
            .collection(
                "customers",
                CollectionBehavior::builder()
                    .id_strategy(IdStrategy::Uuid)
                    .build(),
            )
            .build();

        assert_eq!(registry.strategy("customers", IdStrategy::Autoincrement), IdStrategy::Uuid);
        assert_eq!(registry.strategy("orders", IdStrategy::Provided), IdStrategy::Provided);
        assert!(registry.behavior("orders").filters.is_empty());
    }

    #[test]
    fn joins_are_found_by_output_field() {
        let behavior = CollectionBehavior::builder()
            .join(JoinSpec::new("customerId", "customers"))
            .build();

        assert!(behavior.join_for_field("customer").is_some());
        assert!(behavior.join_for_field("customerId").is_none());
    }
}
