//! Convenient re-exports of commonly used types from mockrest.
//!
//! ```ignore
//! use mockrest::prelude::*;
//! ```
//!
//! This provides access to:
//! - The mock store, router and request/response types
//! - Configuration and per-collection registration
//! - Query construction and the storage backend traits
//! - Error types

pub use mockrest_core::{
    backend::{EntityCursor, StoreBackend, StoreBackendBuilder},
    config::{EngineConfig, IdStrategy, PostRemap, RemapTrigger},
    entity::{EntityId, Resource, ResourceExt},
    error::{MockError, MockResult},
    join::JoinSpec,
    page::{Page, PaginationParams},
    params::QueryParams,
    query::{Expr, FieldOp, Filter, OrderClause, QuerySpec, QueryVisitor, SortDirection},
    registry::{CollectionBehavior, Registry},
    response::{DefaultResponseFactory, MockErrorResponse, MockResponse, Reply, ResponseFactory},
    router::{IdPosition, InterceptContext, Interceptor, Method, MockRequest, Router},
    store::{MockStore, SeedHandle, SeedLoader},
    transform::Transform,
};
pub use mockrest_macros::Resource;
pub use serde::{Deserialize, Serialize};
