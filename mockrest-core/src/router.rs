//! Request routing.
//!
//! A [`Router`] takes a [`MockRequest`] (method, URL, optional body) and answers it the
//! way a REST backend would:
//!
//! 1. The URL is split into path segments and a query string. A scheme and host are
//!    dropped, as is the configured root path (`api` by default).
//! 2. Segment replacements run: engine-wide first, then those of the collection.
//! 3. A POST may be remapped to another method by a URL suffix, a query parameter
//!    or a body field.
//! 4. Interceptors registered for the collection get the first chance to answer.
//! 5. Otherwise the request maps onto [`MockStore`] CRUD: `collection[/id]`.
//!
//! Both outcomes pass through a [`ResponseFactory`] after the configured delay.

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, future::Future, str::FromStr, sync::Arc};
use tracing::{debug, warn};

use crate::{
    config::{EngineConfig, RemapTrigger},
    entity::ID_FIELD,
    error::{MockError, MockResult},
    params::{QueryParams, QueryParser},
    query::QuerySpec,
    registry::CollectionBehavior,
    response::{DefaultResponseFactory, ErrorParts, Reply, ResponseFactory, ResponseParts, status_text},
    store::MockStore,
};

/// HTTP method of a mock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = MockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(MockError::MethodNotAllowed(s.to_string())),
        }
    }
}

/// An incoming request.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    pub method: Method,
    /// The request URL. May carry a query string.
    pub url: String,
    /// The URL with query parameters, when the caller keeps them separately.
    /// Its query string wins over that of `url`.
    pub url_with_params: Option<String>,
    pub body: Option<Value>,
}

impl MockRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            url_with_params: None,
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_params(mut self, url_with_params: impl Into<String>) -> Self {
        self.url_with_params = Some(url_with_params.into());
        self
    }
}

/// Where an interceptor's path sits relative to the entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPosition {
    /// `collection/{path}`
    BeforeId,
    /// `collection/{id}/{path}`
    AfterId,
}

/// What an interceptor receives.
#[derive(Debug, Clone)]
pub struct InterceptContext {
    pub store: MockStore,
    pub method: Method,
    pub url: String,
    pub collection: String,
    /// The id segment, for [`IdPosition::AfterId`] interceptors.
    pub id: Option<String>,
    pub query: QueryParams,
    pub body: Option<Value>,
}

type InterceptFn = dyn Fn(InterceptContext) -> BoxFuture<'static, MockResult<Reply>> + Send + Sync;

/// A custom handler for a method and path below a collection.
///
/// Its reply is sent as-is: no envelope, no hooks.
#[derive(Clone)]
pub struct Interceptor {
    pub method: Method,
    pub path: String,
    pub position: IdPosition,
    handler: Arc<InterceptFn>,
}

impl Interceptor {
    pub fn new<F, Fut>(method: Method, path: impl Into<String>, position: IdPosition, handler: F) -> Self
    where
        F: Fn(InterceptContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MockResult<Reply>> + Send + 'static,
    {
        Self {
            method,
            path: path.into().trim_matches('/').to_string(),
            position,
            handler: Arc::new(move |ctx| handler(ctx).boxed()),
        }
    }

    /// Matches the segments after the collection. On a match, returns the id segment
    /// (always `None` for [`IdPosition::BeforeId`]).
    fn matches(&self, method: Method, rest: &[String]) -> Option<Option<String>> {
        if method != self.method {
            return None;
        }

        match self.position {
            IdPosition::BeforeId => (rest.join("/") == self.path).then_some(None),
            IdPosition::AfterId => match rest.split_first() {
                Some((id, tail)) if !tail.is_empty() && tail.join("/") == self.path => Some(Some(id.clone())),
                _ => None,
            },
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Path segments and query parameters of a request URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUrl {
    pub segments: Vec<String>,
    pub query: QueryParams,
}

/// Splits a relative or absolute URL, dropping scheme, host and the root path.
pub fn parse_url(url: &str, root_path: Option<&str>) -> ParsedUrl {
    let url = url.split('#').next().unwrap_or_default();
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = match path.split_once("://") {
        Some((_, after_scheme)) => after_scheme
            .split_once('/')
            .map(|(_, path)| path)
            .unwrap_or_default(),
        None => path,
    };

    let mut segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect();

    if let Some(root) = root_path {
        let root: Vec<&str> = root.split('/').filter(|s| !s.is_empty()).collect();
        let has_root = !root.is_empty()
            && segments.len() >= root.len()
            && segments.iter().zip(&root).all(|(a, b)| a == b);
        if has_root {
            segments.drain(..root.len());
        }
    }

    ParsedUrl {
        segments,
        query: QueryParams::parse(query),
    }
}

fn replace_segments(segments: &mut [String], replacements: &std::collections::HashMap<String, String>) {
    if replacements.is_empty() {
        return;
    }

    for segment in segments.iter_mut() {
        if let Some(replacement) = replacements.get(segment.as_str()) {
            *segment = replacement.clone();
        }
    }
}

/// Applies the first matching POST remap. Body-field triggers remove their field.
fn remap_post(
    behavior: &CollectionBehavior,
    config: &EngineConfig,
    rest: &mut Vec<String>,
    query: &QueryParams,
    body: &mut Option<Value>,
) -> Option<Method> {
    for remap in behavior.post_remaps.iter().chain(config.post_remaps.iter()) {
        let matched = match &remap.trigger {
            RemapTrigger::UrlSegment { segment } => {
                let hit = rest.len() > 1 && rest.last() == Some(segment);
                if hit {
                    rest.pop();
                }
                hit
            }
            RemapTrigger::QueryParam { name, value } => query
                .get(name)
                .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value))),
            RemapTrigger::BodyField { name, value } => match body {
                Some(Value::Object(map)) => {
                    let hit = map
                        .get(name)
                        .and_then(Value::as_str)
                        .is_some_and(|v| v.eq_ignore_ascii_case(value));
                    if hit {
                        map.remove(name);
                    }
                    hit
                }
                _ => false,
            },
        };

        if matched {
            return Some(remap.method);
        }
    }

    None
}

/// Routes requests to a [`MockStore`] and shapes the outcome with a [`ResponseFactory`].
#[derive(Debug, Clone)]
pub struct Router<F = DefaultResponseFactory> {
    store: MockStore,
    factory: F,
}

impl Router<DefaultResponseFactory> {
    pub fn new(store: MockStore) -> Self {
        Self::with_factory(store, DefaultResponseFactory)
    }
}

impl<F: ResponseFactory> Router<F> {
    pub fn with_factory(store: MockStore, factory: F) -> Self {
        Self { store, factory }
    }

    pub fn store(&self) -> &MockStore {
        &self.store
    }

    /// Answers one request. Every outcome, success or failure, waits for the
    /// configured delay first.
    pub async fn handle(&self, request: MockRequest) -> Result<F::Response, F::Error> {
        let url = request.url.clone();
        debug!(method = %request.method, url = %url, "routing request");

        let outcome = self.dispatch(request).await;
        self.delay().await;

        match outcome {
            Ok(parts) => Ok(self.factory.success(parts)),
            Err(err) => {
                if err.status() >= 500 {
                    warn!(url = %url, error = %err, "request failed");
                } else {
                    debug!(url = %url, status = err.status(), error = %err, "request rejected");
                }
                Err(self.factory.failure(ErrorParts::new(url, err)))
            }
        }
    }

    /// Like [`Router::handle`], for callers holding the method as text.
    /// Unknown methods answer 405.
    pub async fn handle_raw(&self, method: &str, url: &str, body: Option<Value>) -> Result<F::Response, F::Error> {
        match method.parse::<Method>() {
            Ok(method) => {
                let mut request = MockRequest::new(method, url);
                request.body = body;
                self.handle(request).await
            }
            Err(err) => {
                self.delay().await;
                Err(self.factory.failure(ErrorParts::new(url, err)))
            }
        }
    }

    async fn delay(&self) {
        if let Some(delay) = self.store.config().delay() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn dispatch(&self, request: MockRequest) -> MockResult<ResponseParts> {
        let config = self.store.config();
        let registry = self.store.registry();

        let source = request
            .url_with_params
            .as_deref()
            .unwrap_or(&request.url);
        let ParsedUrl { mut segments, query } = parse_url(source, config.root_path.as_deref());

        replace_segments(&mut segments, &config.segment_replacements);
        let Some(first) = segments.first() else {
            return Err(MockError::CollectionNotFound(String::new()));
        };
        let collection_replacements = &registry.behavior(first).segment_replacements;
        replace_segments(&mut segments, collection_replacements);

        let collection = segments.remove(0);
        let behavior = registry.behavior(&collection);
        let mut rest = segments;
        let mut method = request.method;
        let mut body = request.body;
        let mut remapped = false;

        if method == Method::Post {
            if let Some(target) = remap_post(behavior, config, &mut rest, &query, &mut body) {
                debug!(collection = %collection, method = %target, "POST remapped");
                method = target;
                remapped = true;
            }
        }

        for interceptor in &behavior.interceptors {
            if let Some(id) = interceptor.matches(method, &rest) {
                debug!(collection = %collection, path = %interceptor.path, "request intercepted");
                let ctx = InterceptContext {
                    store: self.store.clone(),
                    method,
                    url: request.url.clone(),
                    collection: collection.clone(),
                    id,
                    query,
                    body,
                };
                let reply = (interceptor.handler)(ctx).await?;
                return Ok(self.parts(&request.url, reply, false));
            }
        }

        if rest.len() > 1 {
            return Err(MockError::CollectionNotFound(format!("{collection}/{}", rest.join("/"))));
        }
        if !self.store.backend().has_collection(&collection).await? {
            return Err(MockError::CollectionNotFound(collection));
        }

        let mut id = rest.into_iter().next();
        if id.is_none() && remapped && matches!(method, Method::Put | Method::Delete) {
            // A remapped request may only name its target in the body.
            id = body
                .as_ref()
                .and_then(|body| body.get(ID_FIELD))
                .and_then(|id| match id {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
        }
        let has_url_id = id.is_some();
        let body = body.unwrap_or_else(|| Value::Object(Map::new()));

        let reply = match method {
            Method::Get => {
                let spec = match id {
                    Some(_) => QuerySpec::new(),
                    None => QueryParser::new(registry, config).parse(&collection, &query),
                };
                self.store.get(&collection, id.as_deref(), &spec).await?
            }
            Method::Post => self.store.create(&collection, id.as_deref(), body).await?,
            Method::Put => self.store.update(&collection, id.as_deref(), body).await?,
            Method::Delete => self.store.delete(&collection, id.as_deref()).await?,
            other => return Err(MockError::MethodNotAllowed(other.to_string())),
        };

        Ok(self.parts(&request.url, reply, has_url_id))
    }

    fn parts(&self, url: &str, reply: Reply, has_url_id: bool) -> ResponseParts {
        let mut headers = reply.headers;

        if let Some(id) = &reply.created {
            let path = url.split(['?', '#']).next().unwrap_or_default();
            let location = match has_url_id {
                true => path.to_string(),
                false => format!("{}/{id}", path.trim_end_matches('/')),
            };
            headers.push(("Location".to_string(), location));
        }

        ResponseParts {
            url: url.to_string(),
            status: reply.status,
            status_text: status_text(reply.status),
            body: reply.body,
            headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segments(parsed: &ParsedUrl) -> Vec<&str> {
        parsed.segments.iter().map(String::as_str).collect()
    }

    #[test]
    fn absolute_urls_lose_host_and_root() {
        let parsed = parse_url("https://example.com/api/customers/5?name=ada", Some("api"));

        assert_eq!(segments(&parsed), vec!["customers", "5"]);
        assert_eq!(parsed.query.first("name"), Some("ada"));
    }

    #[test]
    fn nested_root_paths_are_stripped() {
        let parsed = parse_url("/api/v1/orders", Some("api/v1"));
        assert_eq!(segments(&parsed), vec!["orders"]);

        let unrooted = parse_url("orders/7", Some("api/v1"));
        assert_eq!(segments(&unrooted), vec!["orders", "7"]);
    }

    #[test]
    fn methods_parse_case_insensitively() {
        assert_eq!("delete".parse::<Method>().unwrap(), Method::Delete);
        assert_eq!(
            "BREW".parse::<Method>().unwrap_err(),
            MockError::MethodNotAllowed("BREW".into())
        );
    }

    #[test]
    fn interceptors_match_around_the_id() {
        let handler = |_| async { Ok(Reply::no_content()) };
        let before = Interceptor::new(Method::Get, "/stats", IdPosition::BeforeId, handler);
        let after = Interceptor::new(Method::Post, "activate", IdPosition::AfterId, handler);

        let stats = vec!["stats".to_string()];
        let activate = vec!["5".to_string(), "activate".to_string()];

        assert_eq!(before.matches(Method::Get, &stats), Some(None));
        assert_eq!(before.matches(Method::Post, &stats), None);
        assert_eq!(after.matches(Method::Post, &activate), Some(Some("5".to_string())));
        assert_eq!(after.matches(Method::Post, &stats), None);
    }

    #[test]
    fn post_remaps_consume_their_trigger() {
        let config = EngineConfig::builder()
            .post_remap(crate::config::PostRemap::url_segment("delete", Method::Delete))
            .post_remap(crate::config::PostRemap::body_field("_method", "put", Method::Put))
            .build();
        let behavior = CollectionBehavior::default();
        let query = QueryParams::new();

        let mut rest = vec!["5".to_string(), "delete".to_string()];
        let mut body = None;
        assert_eq!(
            remap_post(&behavior, &config, &mut rest, &query, &mut body),
            Some(Method::Delete)
        );
        assert_eq!(rest, vec!["5".to_string()]);

        let mut rest = vec![];
        let mut body = Some(serde_json::json!({ "id": 3, "_method": "PUT" }));
        assert_eq!(
            remap_post(&behavior, &config, &mut rest, &query, &mut body),
            Some(Method::Put)
        );
        assert_eq!(body, Some(serde_json::json!({ "id": 3 })));
    }
}
