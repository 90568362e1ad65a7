//! Storage backend abstraction for the mock engine.
//!
//! A backend only stores entities: it knows nothing about id strategies, hooks, joins
//! or response policy. That logic lives once in [`MockStore`](crate::store::MockStore),
//! which drives any [`StoreBackend`] through the small set of primitives defined here.
//!
//! # Overview
//!
//! Every backend keeps a set of named collections. Each collection maps an
//! [`EntityId`] to one JSON entity, and iterates its entities in ascending id order
//! (numeric ids first, then textual ids).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use mockrest::backend::StoreBackend;
//! use mockrest::entity::EntityId;
//! use serde_json::json;
//!
//! let backend = InMemoryStore::new();
//! backend.create_collection("customers").await?;
//! backend.add("customers", &EntityId::Number(1), json!({ "id": 1, "name": "Ada" })).await?;
//!
//! assert_eq!(backend.count("customers").await?, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};

use crate::{entity::EntityId, error::MockResult};

/// A lazily consumed sequence of stored entities, in ascending id order.
///
/// Persistent backends decode entities as the cursor advances, so each item may fail.
pub type EntityCursor = Box<dyn Iterator<Item = MockResult<Value>> + Send>;

/// Abstract interface for entity storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Operations on one collection never observe partial writes of another
/// operation on the same collection.
///
/// # Error Handling
///
/// Operations on a collection that was never created fail with
/// [`MockError::CollectionNotFound`](crate::error::MockError::CollectionNotFound).
/// Storage failures surface as [`MockError::Backend`](crate::error::MockError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Creates an empty collection. Creating an existing collection is a no-op.
    async fn create_collection(&self, name: &str) -> MockResult<()>;

    /// Drops a collection and all its entities. Dropping a missing collection is a no-op.
    async fn drop_collection(&self, name: &str) -> MockResult<()>;

    /// Removes every entity of a collection while keeping the collection.
    async fn clear_collection(&self, name: &str) -> MockResult<()>;

    /// Lists the names of all collections, sorted.
    async fn list_collections(&self) -> MockResult<Vec<String>>;

    /// Whether the collection exists.
    async fn has_collection(&self, name: &str) -> MockResult<bool>;

    /// Retrieves one entity by id.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the collection exists but holds no entity with that id.
    async fn get(&self, collection: &str, id: &EntityId) -> MockResult<Option<Value>>;

    /// Inserts a new entity.
    ///
    /// The existence check and the write are atomic with respect to other writers.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Conflict`](crate::error::MockError::Conflict) if an entity with
    /// the same id already exists.
    async fn add(&self, collection: &str, id: &EntityId, entity: Value) -> MockResult<()>;

    /// Inserts or replaces an entity.
    ///
    /// # Returns
    ///
    /// The entity previously stored under `id`, if any.
    async fn put(&self, collection: &str, id: &EntityId, entity: Value) -> MockResult<Option<Value>>;

    /// Removes an entity.
    ///
    /// # Returns
    ///
    /// `true` if an entity was removed.
    async fn remove(&self, collection: &str, id: &EntityId) -> MockResult<bool>;

    /// Opens a cursor over every entity of a collection, in ascending id order.
    async fn scan(&self, collection: &str) -> MockResult<EntityCursor>;

    /// Number of entities in a collection.
    async fn count(&self, collection: &str) -> MockResult<usize>;

    /// The greatest numeric id stored in a collection, if any.
    ///
    /// Used to assign the next `autoincrement` id.
    async fn max_numeric_id(&self, collection: &str) -> MockResult<Option<i64>>;

    /// Drops every collection.
    async fn delete_database(&self) -> MockResult<()>;

    /// Flushes pending writes to durable storage.
    ///
    /// The default implementation is a no-op, but backends with persistent storage
    /// should override this.
    async fn flush(&self) -> MockResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn create_collection(&self, name: &str) -> MockResult<()> {
        (**self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> MockResult<()> {
        (**self).drop_collection(name).await
    }

    async fn clear_collection(&self, name: &str) -> MockResult<()> {
        (**self).clear_collection(name).await
    }

    async fn list_collections(&self) -> MockResult<Vec<String>> {
        (**self).list_collections().await
    }

    async fn has_collection(&self, name: &str) -> MockResult<bool> {
        (**self).has_collection(name).await
    }

    async fn get(&self, collection: &str, id: &EntityId) -> MockResult<Option<Value>> {
        (**self).get(collection, id).await
    }

    async fn add(&self, collection: &str, id: &EntityId, entity: Value) -> MockResult<()> {
        (**self).add(collection, id, entity).await
    }

    async fn put(&self, collection: &str, id: &EntityId, entity: Value) -> MockResult<Option<Value>> {
        (**self).put(collection, id, entity).await
    }

    async fn remove(&self, collection: &str, id: &EntityId) -> MockResult<bool> {
        (**self).remove(collection, id).await
    }

    async fn scan(&self, collection: &str) -> MockResult<EntityCursor> {
        (**self).scan(collection).await
    }

    async fn count(&self, collection: &str) -> MockResult<usize> {
        (**self).count(collection).await
    }

    async fn max_numeric_id(&self, collection: &str) -> MockResult<Option<i64>> {
        (**self).max_numeric_id(collection).await
    }

    async fn delete_database(&self) -> MockResult<()> {
        (**self).delete_database().await
    }

    async fn flush(&self) -> MockResult<()> {
        (**self).flush().await
    }
}

/// Factory trait for backends that need asynchronous setup.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> MockResult<Self::Backend>;
}
