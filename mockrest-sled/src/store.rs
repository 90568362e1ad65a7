//! Persistent storage implementation backed by sled.
//!
//! Each collection is a sled tree named after it. Keys are encoded ids (see
//! [`keys`](crate::keys)) so trees iterate in id order; values are BSON documents.

use async_trait::async_trait;
use serde_json::Value;
use sled::{Db, IVec, Tree};
use std::path::PathBuf;
use tracing::{debug, info};

use mockrest_core::{
    backend::{EntityCursor, StoreBackend, StoreBackendBuilder},
    entity::EntityId,
    error::{MockError, MockResult},
};

use crate::keys::{self, NUMBER_PREFIX};

/// Name of sled's own default tree, which is never a collection.
const DEFAULT_TREE: &[u8] = b"__sled__default";

fn backend_error(err: sled::Error) -> MockError {
    MockError::Backend(format!("sled: {err}"))
}

fn to_bytes(entity: &Value) -> MockResult<Vec<u8>> {
    bson::serialize_to_vec(entity).map_err(|err| MockError::Serialization(err.to_string()))
}

fn from_bytes(bytes: &[u8]) -> MockResult<Value> {
    bson::deserialize_from_slice(bytes).map_err(|err| MockError::Serialization(err.to_string()))
}

/// sled-backed entity storage.
///
/// # Thread Safety
///
/// `SledStore` is cheap to clone; clones share the same database. sled calls block,
/// so every sled call runs on tokio's blocking pool and a tokio runtime is required.
///
/// # Example
///
/// ```ignore
/// use mockrest_sled::SledStore;
///
/// let store = SledStore::open("./mock-data")?;
/// let engine = MockStore::new(store);
/// ```
#[derive(Clone, Debug)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Opens (or creates) a database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> MockResult<Self> {
        let db = sled::Config::new()
            .path(path.into())
            .open()
            .map_err(backend_error)?;

        Ok(Self { db })
    }

    /// Opens a database that is deleted when dropped.
    pub fn temporary() -> MockResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(backend_error)?;

        Ok(Self { db })
    }

    /// Wraps an already opened database.
    pub fn from_db(db: Db) -> Self {
        Self { db }
    }

    pub fn builder() -> SledStoreBuilder {
        SledStoreBuilder::default()
    }

    /// Runs `f` on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> MockResult<T>
    where
        F: FnOnce(&Db) -> MockResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|err| MockError::Backend(format!("sled task failed: {err}")))?
    }
}

fn exists(db: &Db, name: &str) -> bool {
    db.tree_names()
        .iter()
        .any(|tree| tree.as_ref() == name.as_bytes())
}

/// Opens the tree of an existing collection without creating it.
fn collection(db: &Db, name: &str) -> MockResult<Tree> {
    if name.as_bytes() == DEFAULT_TREE || !exists(db, name) {
        return Err(MockError::CollectionNotFound(name.to_string()));
    }

    db.open_tree(name).map_err(backend_error)
}

fn decode_value(value: Option<IVec>) -> MockResult<Option<Value>> {
    value.map(|bytes| from_bytes(&bytes)).transpose()
}

#[async_trait]
impl StoreBackend for SledStore {
    async fn create_collection(&self, name: &str) -> MockResult<()> {
        if name.as_bytes() == DEFAULT_TREE {
            return Err(MockError::Configuration(format!("{name} is reserved")));
        }

        let name = name.to_string();
        self.blocking(move |db| {
            db.open_tree(&name).map_err(backend_error)?;
            Ok(())
        })
        .await
    }

    async fn drop_collection(&self, name: &str) -> MockResult<()> {
        if name.as_bytes() == DEFAULT_TREE {
            return Ok(());
        }

        let name = name.to_string();
        self.blocking(move |db| {
            if db.drop_tree(&name).map_err(backend_error)? {
                debug!(collection = %name, "collection dropped");
            }
            Ok(())
        })
        .await
    }

    async fn clear_collection(&self, name: &str) -> MockResult<()> {
        let name = name.to_string();
        self.blocking(move |db| collection(db, &name)?.clear().map_err(backend_error))
            .await
    }

    async fn list_collections(&self) -> MockResult<Vec<String>> {
        self.blocking(|db| {
            let mut names: Vec<String> = db
                .tree_names()
                .into_iter()
                .filter(|tree| tree.as_ref() != DEFAULT_TREE)
                .map(|tree| String::from_utf8_lossy(&tree).into_owned())
                .collect();
            names.sort();
            Ok(names)
        })
        .await
    }

    async fn has_collection(&self, name: &str) -> MockResult<bool> {
        if name.as_bytes() == DEFAULT_TREE {
            return Ok(false);
        }

        let name = name.to_string();
        self.blocking(move |db| Ok(exists(db, &name))).await
    }

    async fn get(&self, collection_name: &str, id: &EntityId) -> MockResult<Option<Value>> {
        let name = collection_name.to_string();
        let key = keys::encode(id);

        self.blocking(move |db| {
            let tree = collection(db, &name)?;
            decode_value(tree.get(key).map_err(backend_error)?)
        })
        .await
    }

    async fn add(&self, collection_name: &str, id: &EntityId, entity: Value) -> MockResult<()> {
        let name = collection_name.to_string();
        let key = keys::encode(id);
        let bytes = to_bytes(&entity)?;
        let conflict = MockError::Conflict(id.to_string(), collection_name.to_string());

        self.blocking(move |db| {
            let tree = collection(db, &name)?;
            // Succeeds only if the key is absent.
            match tree
                .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))
                .map_err(backend_error)?
            {
                Ok(()) => Ok(()),
                Err(_) => Err(conflict),
            }
        })
        .await
    }

    async fn put(&self, collection_name: &str, id: &EntityId, entity: Value) -> MockResult<Option<Value>> {
        let name = collection_name.to_string();
        let key = keys::encode(id);
        let bytes = to_bytes(&entity)?;

        self.blocking(move |db| {
            let tree = collection(db, &name)?;
            decode_value(tree.insert(key, bytes).map_err(backend_error)?)
        })
        .await
    }

    async fn remove(&self, collection_name: &str, id: &EntityId) -> MockResult<bool> {
        let name = collection_name.to_string();
        let key = keys::encode(id);

        self.blocking(move |db| {
            let tree = collection(db, &name)?;
            Ok(tree.remove(key).map_err(backend_error)?.is_some())
        })
        .await
    }

    async fn scan(&self, collection_name: &str) -> MockResult<EntityCursor> {
        let name = collection_name.to_string();
        let values = self
            .blocking(move |db| {
                collection(db, &name)?
                    .iter()
                    .values()
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(backend_error)
            })
            .await?;

        // Raw values are read on the blocking pool; entities decode as the cursor advances.
        let cursor = values.into_iter().map(|bytes| from_bytes(&bytes));

        Ok(Box::new(cursor))
    }

    async fn count(&self, collection_name: &str) -> MockResult<usize> {
        let name = collection_name.to_string();
        self.blocking(move |db| Ok(collection(db, &name)?.len()))
            .await
    }

    async fn max_numeric_id(&self, collection_name: &str) -> MockResult<Option<i64>> {
        let name = collection_name.to_string();

        self.blocking(move |db| {
            let tree = collection(db, &name)?;
            match tree.scan_prefix(NUMBER_PREFIX).next_back() {
                Some(entry) => {
                    let (key, _) = entry.map_err(backend_error)?;
                    Ok(keys::decode(&key)?.as_number())
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn delete_database(&self) -> MockResult<()> {
        self.blocking(|db| {
            for name in db.tree_names() {
                if name.as_ref() != DEFAULT_TREE {
                    db.drop_tree(&name).map_err(backend_error)?;
                }
            }
            info!("sled database cleared");
            Ok(())
        })
        .await
    }

    async fn flush(&self) -> MockResult<()> {
        self.blocking(|db| {
            let flushed = db.flush().map_err(backend_error)?;
            debug!(bytes = flushed, "sled flushed");
            Ok(())
        })
        .await
    }
}

/// Builder for constructing [`SledStore`] instances.
///
/// # Example
///
/// ```ignore
/// use mockrest_sled::SledStore;
/// use mockrest::backend::StoreBackendBuilder;
///
/// let store = SledStore::builder().path("./mock-data").build().await?;
/// ```
#[derive(Debug, Default)]
pub struct SledStoreBuilder {
    path: Option<PathBuf>,
    temporary: bool,
    collections: Vec<String>,
}

impl SledStoreBuilder {
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Deletes the database when the store is dropped.
    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    /// Creates the named collection on build if it does not exist yet.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for SledStoreBuilder {
    type Backend = SledStore;

    async fn build(self) -> MockResult<Self::Backend> {
        let store = match (self.path, self.temporary) {
            (Some(path), temporary) => {
                let db = sled::Config::new()
                    .path(path)
                    .temporary(temporary)
                    .open()
                    .map_err(backend_error)?;
                SledStore::from_db(db)
            }
            (None, true) => SledStore::temporary()?,
            (None, false) => {
                return Err(MockError::Configuration(
                    "sled store needs a path unless it is temporary".to_string(),
                ));
            }
        };

        for name in &self.collections {
            store.create_collection(name).await?;
        }

        Ok(store)
    }
}
