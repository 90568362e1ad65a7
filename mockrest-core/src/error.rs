//! Error types and result types for mock engine operations.
//!
//! Every failure the engine can produce is a [`MockError`]. Each variant knows the
//! HTTP status a real backend would answer with, so the router can turn any `Err`
//! into an error response without inspecting where it came from.
//! Use [`MockResult<T>`] as the return type for fallible operations.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur while serving a mock request.
///
/// The variants follow the taxonomy of a REST backend: validation problems are
/// `400`, missing entities or collections are `404`, duplicate creates are `409`,
/// and storage failures are `500`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MockError {
    /// The request carried an id in the URL that disagrees with the id in the body.
    /// The first argument is the URL id, the second is the body id.
    #[error("Id in URL ({0}) does not match id in body ({1})")]
    IdMismatch(String, String),
    /// An id was required but none was supplied.
    /// The argument is the collection name.
    #[error("Missing id for collection {0}")]
    MissingId(String),
    /// The request body is not usable as an entity.
    #[error("Invalid body: {0}")]
    InvalidBody(String),
    /// The requested entity was not found in the collection.
    /// The first argument is the entity id, the second is the collection name.
    #[error("Collection '{1}' with id='{0}' not found")]
    EntityNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// An entity with the given id already exists in the collection.
    /// The first argument is the entity id, the second is the collection name.
    #[error("Entity {0} already exists in collection {1}")]
    Conflict(String, String),
    /// The HTTP method is not supported for the resolved route.
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),
    /// The engine was set up in a way that cannot serve the request.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Serialization/deserialization error when converting stored values.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend or in a hook.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl MockError {
    /// The HTTP status code a real backend would answer with.
    pub fn status(&self) -> u16 {
        match self {
            MockError::IdMismatch(..)
            | MockError::MissingId(_)
            | MockError::InvalidBody(_)
            | MockError::Configuration(_) => 400,
            MockError::EntityNotFound(..) | MockError::CollectionNotFound(_) => 404,
            MockError::MethodNotAllowed(_) => 405,
            MockError::Conflict(..) => 409,
            MockError::Serialization(_) | MockError::Backend(_) => 500,
        }
    }

    /// Re-labels a hook failure as a backend error, keeping its message.
    pub(crate) fn from_hook(phase: &str, err: MockError) -> Self {
        MockError::Backend(format!("{phase} hook failed: {err}"))
    }
}

/// A specialized `Result` type for mock engine operations.
pub type MockResult<T> = Result<T, MockError>;

impl From<SerdeJsonError> for MockError {
    fn from(err: SerdeJsonError) -> Self {
        MockError::Serialization(err.to_string())
    }
}
