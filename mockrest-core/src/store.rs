//! The mock store: REST-shaped CRUD over any [`StoreBackend`].
//!
//! [`MockStore`] owns the policy a mock REST backend applies on top of plain storage:
//! id assignment, create/update conflict rules, transform hooks, joins, children
//! filters, pagination and body envelopes. Backends only provide the primitives.
//!
//! # Example
//!
//! ```ignore
//! use mockrest::{memory::InMemoryStore, prelude::*};
//!
//! let store = MockStore::builder(InMemoryStore::new())
//!     .config(EngineConfig::builder().post409(true).build())
//!     .build();
//!
//! store.create_collection("customers", &[SeedLoader::entities(vec![
//!     json!({ "name": "Ada" }),
//!     json!({ "name": "Grace" }),
//! ])]).await?;
//!
//! let reply = store.get("customers", Some("2"), &QuerySpec::new()).await?;
//! assert_eq!(reply.body, Some(json!({ "id": 2, "name": "Grace" })));
//! ```

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::{fmt, future::Future, sync::Arc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    backend::StoreBackend,
    config::{EngineConfig, IdStrategy},
    entity::{EntityId, Resource, ResourceExt, as_object, merge, stamp_id},
    error::{MockError, MockResult},
    evaluator::Evaluator,
    join::{JoinResolver, passes_children},
    page::Page,
    query::QuerySpec,
    registry::{CollectionBehavior, Registry},
    response::{Envelope, Reply},
    transform::Phase,
};

/// How many times an assigned id is retried when a concurrent insert took it first.
const ASSIGN_ATTEMPTS: usize = 8;

type SeedFn = dyn Fn(SeedHandle) -> BoxFuture<'static, MockResult<()>> + Send + Sync;

/// A callback that fills a collection when it is created.
#[derive(Clone)]
pub struct SeedLoader(Arc<SeedFn>);

impl SeedLoader {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(SeedHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MockResult<()>> + Send + 'static,
    {
        Self(Arc::new(move |handle| f(handle).boxed()))
    }

    /// A loader storing a fixed list of entities, in order.
    pub fn entities(entities: Vec<Value>) -> Self {
        Self::new(move |handle| {
            let entities = entities.clone();
            async move {
                for entity in entities {
                    handle.store(entity).await?;
                }
                Ok(())
            }
        })
    }

    async fn run(&self, handle: SeedHandle) -> MockResult<()> {
        (self.0)(handle).await
    }
}

impl fmt::Debug for SeedLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SeedLoader(..)")
    }
}

/// What a seed loader receives: the store, bound to the collection being created.
#[derive(Debug, Clone)]
pub struct SeedHandle {
    store: MockStore,
    collection: String,
}

impl SeedHandle {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn mock_store(&self) -> &MockStore {
        &self.store
    }

    /// Inserts an entity, assigning an id per the collection's strategy if it has none.
    pub async fn store(&self, entity: Value) -> MockResult<EntityId> {
        self.store.store(&self.collection, entity).await
    }
}

/// REST-shaped CRUD engine over a storage backend.
///
/// Cloning is cheap: clones share the backend, registry and configuration.
#[derive(Debug, Clone)]
pub struct MockStore {
    backend: Arc<dyn StoreBackend>,
    registry: Arc<Registry>,
    config: Arc<EngineConfig>,
}

impl MockStore {
    /// Creates a store with default configuration and no registered behavior.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self::builder(backend).build()
    }

    pub fn builder<B: StoreBackend + 'static>(backend: B) -> MockStoreBuilder {
        MockStoreBuilder {
            backend: Arc::new(backend),
            registry: Registry::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn backend(&self) -> &dyn StoreBackend {
        self.backend.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The id strategy in effect for `collection`.
    pub fn strategy(&self, collection: &str) -> IdStrategy {
        self.registry
            .strategy(collection, self.config.strategy_id)
    }

    /// Creates a collection if missing, then runs each seed loader against it.
    #[instrument(skip(self, seeds), fields(seeds = seeds.len()))]
    pub async fn create_collection(&self, name: &str, seeds: &[SeedLoader]) -> MockResult<()> {
        self.backend.create_collection(name).await?;

        for seed in seeds {
            let handle = SeedHandle {
                store: self.clone(),
                collection: name.to_string(),
            };
            seed.run(handle).await?;
        }

        info!(collection = name, "collection ready");
        Ok(())
    }

    pub async fn drop_collection(&self, name: &str) -> MockResult<()> {
        self.backend.drop_collection(name).await
    }

    pub async fn clear_collection(&self, name: &str) -> MockResult<()> {
        self.backend.clear_collection(name).await
    }

    pub async fn list_collections(&self) -> MockResult<Vec<String>> {
        self.backend.list_collections().await
    }

    pub async fn count(&self, collection: &str) -> MockResult<usize> {
        self.backend.count(collection).await
    }

    /// Drops every collection.
    #[instrument(skip(self))]
    pub async fn delete_database(&self) -> MockResult<()> {
        self.backend.delete_database().await?;
        info!("database deleted");
        Ok(())
    }

    /// Inserts an entity as-is, assigning an id if it has none.
    ///
    /// No hooks run. Used by seed loaders.
    ///
    /// # Errors
    ///
    /// [`MockError::Conflict`] if the id is taken, [`MockError::MissingId`] if the
    /// collection uses the `provided` strategy and the entity has no id.
    pub async fn store(&self, collection: &str, entity: Value) -> MockResult<EntityId> {
        as_object(&entity, collection)?;
        let strategy = self.strategy(collection);
        let id = EntityId::of(&entity, strategy)?;

        let (id, _) = self
            .insert_new(collection, strategy, id, entity)
            .await?;
        Ok(id)
    }

    /// Reads one entity (`id` given) or a filtered page of entities.
    #[instrument(skip(self, spec))]
    pub async fn get(&self, collection: &str, id: Option<&str>, spec: &QuerySpec) -> MockResult<Reply> {
        let envelope = Envelope::new(&self.config);

        match id {
            Some(raw) => {
                let entity = self.get_by_id(collection, raw).await?;
                Ok(Reply::ok(envelope.entity(entity)))
            }
            None => {
                let page = self.query(collection, spec).await?;
                Ok(Reply::ok(envelope.page(page, spec.pagination.is_some())))
            }
        }
    }

    /// Reads one entity with joins attached and the get-by-id hook applied.
    pub async fn get_by_id(&self, collection: &str, raw_id: &str) -> MockResult<Value> {
        let behavior = self.registry.behavior(collection);
        let not_found = || MockError::EntityNotFound(raw_id.to_string(), collection.to_string());

        let Ok(id) = EntityId::from_segment(raw_id, self.strategy(collection)) else {
            return match self.backend.has_collection(collection).await? {
                true => Err(not_found()),
                false => Err(MockError::CollectionNotFound(collection.to_string())),
            };
        };

        let mut entity = self
            .backend
            .get(collection, &id)
            .await?
            .ok_or_else(not_found)?;

        self.resolver()
            .attach(&mut entity, &behavior.joins)
            .await?;

        behavior
            .transforms
            .run(Phase::GetById, None, entity)
            .await
    }

    /// Runs a query: filter and order, joins, children filters, pagination, then the
    /// get-all hook over the page.
    ///
    /// Without children filters only the returned page is joined. With them, every
    /// match is joined first so pagination sees the post-join result set.
    pub async fn query(&self, collection: &str, spec: &QuerySpec) -> MockResult<Page<Value>> {
        let behavior = self.registry.behavior(collection);
        let cursor = self.backend.scan(collection).await?;
        let selected = Evaluator::new(&behavior.comparators).select(cursor, spec)?;
        let mut resolver = self.resolver();

        let mut page = if spec.has_children() {
            let mut joined = selected;
            resolver
                .attach_all(&mut joined, &behavior.joins)
                .await?;

            let mut kept = Vec::with_capacity(joined.len());
            for entity in joined {
                if passes_children(&entity, &spec.children)? {
                    kept.push(entity);
                }
            }
            paginate(kept, spec)
        } else {
            let mut page = paginate(selected, spec);
            resolver
                .attach_all(&mut page.items, &behavior.joins)
                .await?;
            page
        };

        debug!(collection, count = page.count, returned = page.items.len(), "query evaluated");

        let items = std::mem::take(&mut page.items);
        page.items = behavior.transforms.run_all(items).await?;
        Ok(page)
    }

    /// Creates an entity.
    ///
    /// An id in both the URL and the body must agree. If the id already exists the
    /// request fails with 409 when `post409` is set, and otherwise updates the entity
    /// through the pre-update hook (merging when `append_existing_post` is set).
    ///
    /// An id supplied only by the post-create hook is always inserted as new: if it is
    /// taken the request fails with 409 regardless of `post409`.
    #[instrument(skip(self, body))]
    pub async fn create(&self, collection: &str, id: Option<&str>, body: Value) -> MockResult<Reply> {
        as_object(&body, collection)?;
        let behavior = self.registry.behavior(collection);
        let strategy = self.strategy(collection);
        let id = self.requested_id(strategy, id, &body)?;

        if let Some(id) = &id {
            if let Some(existing) = self.backend.get(collection, id).await? {
                if self.config.post409 {
                    return Err(MockError::Conflict(id.to_string(), collection.to_string()));
                }

                let entity = self
                    .replace(collection, behavior, id, existing, body, self.config.append_existing_post)
                    .await?;
                return Ok(self.updated_reply(entity));
            }
        }

        let (id, entity) = self
            .create_new(collection, behavior, strategy, id, body)
            .await?;
        Ok(self.created_reply(id, entity))
    }

    /// Updates the entity named by `id`. A body id never stands in for a missing `id`.
    ///
    /// The pre-update hook runs first; the result replaces the stored entity, or merges
    /// into it when `append_put` is set. A missing entity fails with 404 when `put404`
    /// is set, and is otherwise created.
    #[instrument(skip(self, body))]
    pub async fn update(&self, collection: &str, id: Option<&str>, body: Value) -> MockResult<Reply> {
        as_object(&body, collection)?;
        let behavior = self.registry.behavior(collection);
        let strategy = self.strategy(collection);
        let url_id = id.ok_or_else(|| MockError::MissingId(collection.to_string()))?;
        let id = self
            .requested_id(strategy, Some(url_id), &body)?
            .ok_or_else(|| MockError::MissingId(collection.to_string()))?;

        match self.backend.get(collection, &id).await? {
            Some(existing) => {
                let entity = self
                    .replace(collection, behavior, &id, existing, body, self.config.append_put)
                    .await?;
                Ok(self.updated_reply(entity))
            }
            None if self.config.put404 => Err(MockError::EntityNotFound(id.to_string(), collection.to_string())),
            None => {
                let (id, entity) = self
                    .create_new(collection, behavior, strategy, Some(id), body)
                    .await?;
                Ok(self.created_reply(id, entity))
            }
        }
    }

    /// Deletes an entity. Deleting a missing entity is a 404 only when `delete404` is set.
    #[instrument(skip(self))]
    pub async fn delete(&self, collection: &str, id: Option<&str>) -> MockResult<Reply> {
        let raw_id = id.ok_or_else(|| MockError::MissingId(collection.to_string()))?;

        let removed = match EntityId::from_segment(raw_id, self.strategy(collection)) {
            Ok(id) => self.backend.remove(collection, &id).await?,
            Err(_) if self.backend.has_collection(collection).await? => false,
            Err(_) => return Err(MockError::CollectionNotFound(collection.to_string())),
        };

        if !removed && self.config.delete404 {
            return Err(MockError::EntityNotFound(raw_id.to_string(), collection.to_string()));
        }

        Ok(Reply::no_content())
    }

    /// Reads one stored entity as a Rust type. No joins or hooks apply.
    pub async fn typed_get<R: Resource>(&self, id: &EntityId) -> MockResult<Option<R>> {
        self.backend
            .get(R::collection_name(), id)
            .await?
            .map(R::from_entity)
            .transpose()
    }

    /// Runs a query and converts the page to a Rust type.
    pub async fn typed_all<R: Resource>(&self, spec: &QuerySpec) -> MockResult<Page<R>> {
        let mut page = self.query(R::collection_name(), spec).await?;
        let items = std::mem::take(&mut page.items)
            .into_iter()
            .map(R::from_entity)
            .collect::<MockResult<Vec<_>>>()?;

        Ok(page.map_items(items))
    }

    /// Stores a Rust value like [`MockStore::store`].
    pub async fn typed_store<R: Resource>(&self, resource: &R) -> MockResult<EntityId> {
        self.store(R::collection_name(), resource.to_entity()?)
            .await
    }

    fn resolver(&self) -> JoinResolver<'_> {
        JoinResolver::new(self.backend.as_ref(), &self.registry, self.config.strategy_id)
    }

    /// The id a create/update addresses: the URL id, the body id, or none.
    fn requested_id(&self, strategy: IdStrategy, url_id: Option<&str>, body: &Value) -> MockResult<Option<EntityId>> {
        let url_id = url_id
            .map(|raw| EntityId::from_segment(raw, strategy))
            .transpose()?;
        let body_id = EntityId::of(body, strategy)?;

        match (url_id, body_id) {
            (Some(url_id), Some(body_id)) if url_id != body_id => {
                Err(MockError::IdMismatch(url_id.to_string(), body_id.to_string()))
            }
            (Some(url_id), _) => Ok(Some(url_id)),
            (None, body_id) => Ok(body_id),
        }
    }

    async fn assign_id(&self, collection: &str, strategy: IdStrategy) -> MockResult<EntityId> {
        match strategy {
            IdStrategy::Provided => Err(MockError::MissingId(collection.to_string())),
            IdStrategy::Uuid => Ok(EntityId::Text(Uuid::new_v4().to_string())),
            IdStrategy::Autoincrement => {
                let next = match self.backend.max_numeric_id(collection).await? {
                    Some(max) => max
                        .checked_add(1)
                        .ok_or_else(|| MockError::Backend(format!("numeric ids exhausted in {collection}")))?,
                    None => 1,
                };
                Ok(EntityId::Number(next))
            }
        }
    }

    /// Inserts a new entity under `id`, or under an assigned id when `id` is `None`.
    async fn insert_new(
        &self,
        collection: &str,
        strategy: IdStrategy,
        id: Option<EntityId>,
        mut entity: Value,
    ) -> MockResult<(EntityId, Value)> {
        if let Some(id) = id {
            stamp_id(&mut entity, &id);
            self.backend
                .add(collection, &id, entity.clone())
                .await?;
            return Ok((id, entity));
        }

        for _ in 0..ASSIGN_ATTEMPTS {
            let id = self.assign_id(collection, strategy).await?;
            stamp_id(&mut entity, &id);

            match self.backend.add(collection, &id, entity.clone()).await {
                Ok(()) => return Ok((id, entity)),
                Err(MockError::Conflict(..)) => {
                    debug!(collection, %id, "assigned id taken concurrently, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        Err(MockError::Backend(format!("could not assign a free id in {collection}")))
    }

    async fn create_new(
        &self,
        collection: &str,
        behavior: &CollectionBehavior,
        strategy: IdStrategy,
        id: Option<EntityId>,
        body: Value,
    ) -> MockResult<(EntityId, Value)> {
        let entity = behavior
            .transforms
            .run(Phase::PostCreate, None, body)
            .await?;
        as_object(&entity, collection)?;

        // The hook may have supplied the id itself. Such an id is never upserted.
        let id = match id {
            Some(id) => Some(id),
            None => EntityId::of(&entity, strategy)?,
        };

        self.insert_new(collection, strategy, id, entity)
            .await
    }

    async fn replace(
        &self,
        collection: &str,
        behavior: &CollectionBehavior,
        id: &EntityId,
        existing: Value,
        body: Value,
        append: bool,
    ) -> MockResult<Value> {
        let incoming = behavior
            .transforms
            .run(Phase::PreUpdate, Some(existing.clone()), body)
            .await?;

        let mut entity = if append { merge(&existing, &incoming) } else { incoming };
        as_object(&entity, collection)?;
        stamp_id(&mut entity, id);

        self.backend
            .put(collection, id, entity.clone())
            .await?;
        Ok(entity)
    }

    fn updated_reply(&self, entity: Value) -> Reply {
        if self.config.put204 {
            Reply::no_content()
        } else {
            Reply::ok(Envelope::new(&self.config).entity(entity))
        }
    }

    fn created_reply(&self, id: EntityId, entity: Value) -> Reply {
        let body = if self.config.return_item_in201 { entity } else { id.to_value() };
        Reply::created(id, Envelope::new(&self.config).entity(body))
    }
}

fn paginate(items: Vec<Value>, spec: &QuerySpec) -> Page<Value> {
    match spec.pagination {
        Some(params) => params.paginate(items),
        None => Page::whole(items),
    }
}

/// Builder for [`MockStore`].
pub struct MockStoreBuilder {
    backend: Arc<dyn StoreBackend>,
    registry: Registry,
    config: EngineConfig,
}

impl MockStoreBuilder {
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> MockStore {
        MockStore {
            backend: self.backend,
            registry: Arc::new(self.registry),
            config: Arc::new(self.config),
        }
    }
}
