//! Persistent storage backend for mockrest, built on sled.
//!
//! Mock data written through a [`SledStore`] survives restarts, which makes it useful
//! for demos and manual testing against a long-lived fake backend.
//!
//! # Quick Start
//!
//! ```ignore
//! use mockrest::prelude::*;
//! use mockrest::sled::SledStore;
//!
//! let store = MockStore::new(SledStore::open("./mock-data")?);
//! store.create_collection("customers", &[]).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as mockrest_sled;

mod keys;
pub mod store;

pub use store::{SledStore, SledStoreBuilder};
