//! In-memory storage implementation for the mock engine.
//!
//! This module provides a simple in-memory backend that keeps each collection as a
//! vector of entities sorted by [`EntityId`], behind an async-safe read-write lock.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use mockrest_core::{
    backend::{EntityCursor, StoreBackend, StoreBackendBuilder},
    entity::EntityId,
    error::{MockError, MockResult},
};

type StoreMap = HashMap<String, Collection>;

/// Entities of one collection, kept sorted by id.
#[derive(Default, Clone, Debug)]
struct Collection {
    entries: Vec<(EntityId, Value)>,
}

impl Collection {
    fn position(&self, id: &EntityId) -> Result<usize, usize> {
        self.entries.binary_search_by(|(key, _)| key.cmp(id))
    }

    fn get(&self, id: &EntityId) -> Option<&Value> {
        self.position(id).ok().map(|at| &self.entries[at].1)
    }

    /// Inserts or replaces, returning the replaced entity.
    fn insert(&mut self, id: &EntityId, entity: Value) -> Option<Value> {
        match self.position(id) {
            Ok(at) => Some(std::mem::replace(&mut self.entries[at].1, entity)),
            Err(at) => {
                self.entries.insert(at, (id.clone(), entity));
                None
            }
        }
    }

    fn remove(&mut self, id: &EntityId) -> Option<Value> {
        self.position(id)
            .ok()
            .map(|at| self.entries.remove(at).1)
    }

    fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, entity)| entity)
    }

    fn ids(&self) -> impl DoubleEndedIterator<Item = &EntityId> {
        self.entries.iter().map(|(id, _)| id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Thread-safe in-memory entity storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data. Separately constructed instances share nothing.
///
/// # Performance
///
/// Scans copy the collection under the read lock, so a cursor never observes
/// concurrent writes. Fine for the data volumes a mock backend holds.
///
/// # Example
///
/// ```ignore
/// use mockrest_memory::InMemoryStore;
/// use mockrest::backend::StoreBackend;
/// use mockrest::entity::EntityId;
/// use serde_json::json;
///
/// let store = InMemoryStore::new();
/// store.create_collection("users").await?;
/// store.add("users", &EntityId::Number(1), json!({ "id": 1, "name": "Alice" })).await?;
///
/// assert!(store.get("users", &EntityId::Number(1)).await?.is_some());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> entities sorted by id
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with initial collections.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use mockrest_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().collection("customers").build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn missing(collection: &str) -> MockError {
    MockError::CollectionNotFound(collection.to_string())
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn create_collection(&self, name: &str) -> MockResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> MockResult<()> {
        if self.store.write().await.remove(name).is_some() {
            debug!(collection = name, "collection dropped");
        }

        Ok(())
    }

    async fn clear_collection(&self, name: &str) -> MockResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store.get_mut(name).ok_or_else(|| missing(name))?;
        collection_map.clear();

        Ok(())
    }

    async fn list_collections(&self) -> MockResult<Vec<String>> {
        let mut names: Vec<String> = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect();
        names.sort();

        Ok(names)
    }

    async fn has_collection(&self, name: &str) -> MockResult<bool> {
        Ok(self.store.read().await.contains_key(name))
    }

    async fn get(&self, collection: &str, id: &EntityId) -> MockResult<Option<Value>> {
        let store = self.store.read().await;
        let collection_map = store.get(collection).ok_or_else(|| missing(collection))?;

        Ok(collection_map.get(id).cloned())
    }

    async fn add(&self, collection: &str, id: &EntityId, entity: Value) -> MockResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        match collection_map.position(id) {
            Ok(_) => Err(MockError::Conflict(id.to_string(), collection.to_string())),
            Err(at) => {
                collection_map.entries.insert(at, (id.clone(), entity));
                Ok(())
            }
        }
    }

    async fn put(&self, collection: &str, id: &EntityId, entity: Value) -> MockResult<Option<Value>> {
        let mut store = self.store.write().await;
        let collection_map = store
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        Ok(collection_map.insert(id, entity))
    }

    async fn remove(&self, collection: &str, id: &EntityId) -> MockResult<bool> {
        let mut store = self.store.write().await;
        let collection_map = store
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        Ok(collection_map.remove(id).is_some())
    }

    async fn scan(&self, collection: &str) -> MockResult<EntityCursor> {
        let store = self.store.read().await;
        let collection_map = store.get(collection).ok_or_else(|| missing(collection))?;
        let snapshot: Vec<Value> = collection_map.values().cloned().collect();

        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    async fn count(&self, collection: &str) -> MockResult<usize> {
        let store = self.store.read().await;
        let collection_map = store.get(collection).ok_or_else(|| missing(collection))?;

        Ok(collection_map.len())
    }

    async fn max_numeric_id(&self, collection: &str) -> MockResult<Option<i64>> {
        let store = self.store.read().await;
        let collection_map = store.get(collection).ok_or_else(|| missing(collection))?;

        // Numeric ids sort first, so the last numeric key is the greatest.
        Ok(collection_map
            .ids()
            .rev()
            .find_map(EntityId::as_number))
    }

    async fn delete_database(&self) -> MockResult<()> {
        self.store.write().await.clear();
        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use mockrest_memory::InMemoryStore;
/// use mockrest::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .collection("customers")
///     .collection("orders")
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    collections: Vec<String>,
}

impl InMemoryStoreBuilder {
    /// Creates the named (empty) collection up front.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds.
    async fn build(self) -> MockResult<Self::Backend> {
        let store = InMemoryStore::new();
        for name in &self.collections {
            store.create_collection(name).await?;
        }

        Ok(store)
    }
}
