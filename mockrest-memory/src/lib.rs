//! In-memory storage backend for mockrest.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is the default
//! backend for tests and demos.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Ordered collections** - Entities iterate in id order, numeric ids first
//! - **Isolation** - Every instance owns its data; clones share it
//!
//! # Quick Start
//!
//! ```ignore
//! use mockrest::prelude::*;
//! use mockrest::memory::InMemoryStore;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MockStore::new(InMemoryStore::new());
//!     store.create_collection("users", &[]).await?;
//!
//!     let reply = store.create("users", None, json!({ "name": "Alice" })).await?;
//!     assert_eq!(reply.status, 201);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mockrest_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
