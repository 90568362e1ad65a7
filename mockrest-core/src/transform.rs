//! Per-collection transform hooks.
//!
//! A [`Transform`] rewrites an entity at one phase of request processing. Hooks may be
//! written as plain functions or as async functions; both are stored as the same boxed
//! future type so the engine never needs to know which kind it is calling.

use futures::future::{BoxFuture, FutureExt, ready};
use serde_json::Value;
use std::{fmt, future::Future, sync::Arc};

use crate::error::{MockError, MockResult};

type TransformFn = dyn Fn(Option<Value>, Value) -> BoxFuture<'static, MockResult<Value>> + Send + Sync;

/// The point in request processing a hook runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before a new entity is inserted. Receives the incoming body only.
    PostCreate,
    /// Before an existing entity is overwritten. Receives the stored entity and the body.
    PreUpdate,
    /// Before a single entity is returned.
    GetById,
    /// Before a page of entities is returned. Receives the page as a JSON array.
    GetAll,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::PostCreate => "post-create",
            Phase::PreUpdate => "pre-update",
            Phase::GetById => "get-by-id",
            Phase::GetAll => "get-all",
        }
    }
}

/// A transform function `(existing?, incoming) -> entity`.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    /// Wraps a synchronous function.
    ///
    /// ```ignore
    /// let stamp = Transform::sync(|_, mut incoming| {
    ///     incoming["createdAt"] = json!("2024-01-01T00:00:00Z");
    ///     Ok(incoming)
    /// });
    /// ```
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Option<Value>, Value) -> MockResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(move |existing, incoming| ready(f(existing, incoming)).boxed()))
    }

    /// Wraps a function returning a future.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(Option<Value>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MockResult<Value>> + Send + 'static,
    {
        Self(Arc::new(move |existing, incoming| f(existing, incoming).boxed()))
    }

    pub async fn apply(&self, existing: Option<Value>, incoming: Value) -> MockResult<Value> {
        (self.0)(existing, incoming).await
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

/// The optional hooks of one collection.
#[derive(Debug, Clone, Default)]
pub struct Transforms {
    pub post_create: Option<Transform>,
    pub pre_update: Option<Transform>,
    pub get_by_id: Option<Transform>,
    pub get_all: Option<Transform>,
}

impl Transforms {
    fn hook(&self, phase: Phase) -> Option<&Transform> {
        match phase {
            Phase::PostCreate => self.post_create.as_ref(),
            Phase::PreUpdate => self.pre_update.as_ref(),
            Phase::GetById => self.get_by_id.as_ref(),
            Phase::GetAll => self.get_all.as_ref(),
        }
    }

    /// Runs the hook for `phase`, or passes `incoming` through when none is registered.
    ///
    /// Hook failures surface as backend errors.
    pub async fn run(&self, phase: Phase, existing: Option<Value>, incoming: Value) -> MockResult<Value> {
        match self.hook(phase) {
            Some(hook) => hook
                .apply(existing, incoming)
                .await
                .map_err(|err| MockError::from_hook(phase.name(), err)),
            None => Ok(incoming),
        }
    }

    /// Runs the get-all hook over a page of entities.
    pub async fn run_all(&self, items: Vec<Value>) -> MockResult<Vec<Value>> {
        if self.get_all.is_none() {
            return Ok(items);
        }

        match self.run(Phase::GetAll, None, Value::Array(items)).await? {
            Value::Array(items) => Ok(items),
            other => Err(MockError::Backend(format!(
                "{} hook must return an array, got {other}",
                Phase::GetAll.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_hook_passes_through() {
        let transforms = Transforms::default();
        let out = transforms.run(Phase::PostCreate, None, json!({ "a": 1 })).await.unwrap();
        assert_eq!(out, json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn sync_and_deferred_hooks_are_awaited_alike() {
        let transforms = Transforms {
            post_create: Some(Transform::sync(|_, mut incoming| {
                incoming["created"] = json!(true);
                Ok(incoming)
            })),
            pre_update: Some(Transform::deferred(|existing, incoming| async move {
                let existing = existing.unwrap_or(Value::Null);
                Ok(json!({ "before": existing, "after": incoming }))
            })),
            ..Transforms::default()
        };

        let created = transforms.run(Phase::PostCreate, None, json!({ "id": 1 })).await.unwrap();
        assert_eq!(created, json!({ "id": 1, "created": true }));

        let updated = transforms
            .run(Phase::PreUpdate, Some(json!({ "v": 1 })), json!({ "v": 2 }))
            .await
            .unwrap();
        assert_eq!(updated, json!({ "before": { "v": 1 }, "after": { "v": 2 } }));
    }

    #[tokio::test]
    async fn hook_errors_become_backend_errors() {
        let transforms = Transforms {
            get_by_id: Some(Transform::sync(|_, _| Err(MockError::InvalidBody("nope".into())))),
            ..Transforms::default()
        };

        let err = transforms.run(Phase::GetById, None, json!({})).await.unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn get_all_hook_must_keep_an_array() {
        let transforms = Transforms {
            get_all: Some(Transform::sync(|_, _| Ok(json!({ "not": "an array" })))),
            ..Transforms::default()
        };

        assert!(transforms.run_all(vec![json!({ "id": 1 })]).await.is_err());
    }
}
