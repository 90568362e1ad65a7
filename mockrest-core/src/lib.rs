//! An embeddable mock REST data engine.
//!
//! This crate is the core of the mockrest project and provides:
//!
//! - **Storage abstraction** ([`backend`]) - The primitives a storage backend implements
//! - **Mock store** ([`store`]) - REST-shaped CRUD policy over any backend
//! - **Query model** ([`query`], [`params`]) - Filter expressions, ordering, and query-string parsing
//! - **Evaluation** ([`evaluator`]) - Filtering and composite ordering of entities
//! - **Joins and hooks** ([`join`], [`transform`]) - Related-entity resolution and transform pipelines
//! - **Routing** ([`router`], [`response`]) - URL resolution, interceptors, and response shaping
//! - **Registry and configuration** ([`registry`], [`config`]) - Per-collection and engine-wide behavior
//! - **Error handling** ([`error`]) - Error types carrying their HTTP status
//!
//! # Example
//!
//! ```ignore
//! use mockrest::{memory::InMemoryStore, prelude::*};
//! use serde_json::json;
//!
//! let store = MockStore::new(InMemoryStore::new());
//! store.create_collection("customers", &[SeedLoader::entities(vec![json!({ "name": "Ada" })])]).await?;
//!
//! let router = Router::new(store);
//! let response = router.handle(MockRequest::get("api/customers?name=ad")).await?;
//! assert_eq!(response.body, Some(json!([{ "id": 1, "name": "Ada" }])));
//! ```

#[allow(unused_extern_crates)]
extern crate self as mockrest_core;

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod evaluator;
pub mod join;
pub mod page;
pub mod params;
pub mod query;
pub mod registry;
pub mod response;
pub mod router;
pub mod store;
pub mod transform;
