//! Main mockrest crate: an embeddable mock REST data engine.
//!
//! This crate is the primary entry point. It re-exports the core types from the
//! sub-crates and gives access to the storage backends.
//!
//! # Features
//!
//! - **REST semantics without a server** - Route `GET`/`POST`/`PUT`/`DELETE` requests to named collections
//! - **Query strings** - Filtering, OR groups, composite ordering, pagination and join filters
//! - **Customization** - Transform hooks, joins, interceptors, URL rewrites and POST remaps
//! - **Interchangeable backends** - In-memory by default, sled with the `sled` feature
//!
//! # Quick Start
//!
//! ```ignore
//! use mockrest::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MockStore::builder(InMemoryStore::new())
//!         .config(EngineConfig::builder().page_encapsulation(true).build())
//!         .build();
//!
//!     store
//!         .create_collection("customers", &[SeedLoader::entities(vec![
//!             json!({ "name": "Ada" }),
//!             json!({ "name": "Grace" }),
//!         ])])
//!         .await
//!         .unwrap();
//!
//!     let router = Router::new(store);
//!
//!     let created = router
//!         .handle(MockRequest::post("api/customers", json!({ "name": "Linus" })))
//!         .await
//!         .unwrap();
//!     assert_eq!(created.status, 201);
//!     assert_eq!(created.header("Location"), Some("api/customers/3"));
//!
//!     let page = router
//!         .handle(MockRequest::get("api/customers?orderBy=-name&pageSize=2"))
//!         .await
//!         .unwrap();
//!     println!("{:?}", page.body);
//! }
//! ```
//!
//! # Typed resources
//!
//! ```ignore
//! use mockrest::prelude::*;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Resource)]
//! #[resource(collection = "customers")]
//! pub struct Customer {
//!     pub id: Option<i64>,
//!     pub name: String,
//! }
//!
//! let id = store.typed_store(&Customer { id: None, name: "Ada".into() }).await?;
//! let ada: Option<Customer> = store.typed_get(&id).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `sled` - Persistent storage on disk (requires the `sled` feature)

#[allow(unused_extern_crates)]
extern crate self as mockrest;

pub mod prelude;

pub use mockrest_core::{
    backend, config, entity, error, evaluator, join, page, params, query, registry, response, router, store,
    transform,
};
pub use mockrest_macros::Resource;

// Re-exported for backend implementors and hook authors.
pub use async_trait::async_trait;
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use mockrest_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// sled storage backend implementations.
///
/// This module is only available when the `sled` feature is enabled.
#[cfg(feature = "sled")]
pub mod sled {
    pub use mockrest_sled::{SledStore, SledStoreBuilder};
}
