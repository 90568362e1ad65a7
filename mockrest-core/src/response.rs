//! Response shaping.
//!
//! CRUD operations answer with a [`Reply`]: a status, an optional body and headers.
//! The router turns a reply (or an error) into [`ResponseParts`] / [`ErrorParts`] and
//! hands those to a [`ResponseFactory`], so embedders can produce whatever response
//! type their HTTP stack or test harness expects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    config::EngineConfig,
    entity::EntityId,
    error::MockError,
    page::Page,
};

/// Standard reason phrase for a status code.
pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// The outcome of a successful operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Id of a newly created entity. The router turns it into a `Location` header.
    pub created: Option<EntityId>,
}

impl Reply {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
            created: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, Some(body))
    }

    pub fn created(id: EntityId, body: Value) -> Self {
        Self {
            created: Some(id),
            ..Self::new(201, Some(body))
        }
    }

    pub fn no_content() -> Self {
        Self::new(204, None)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Wraps bodies as configured.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    data: bool,
    page: bool,
}

impl Envelope {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            data: config.data_encapsulation,
            page: config.page_encapsulation,
        }
    }

    /// `{ "data": body }` when data encapsulation is on, `body` otherwise.
    pub fn entity(&self, body: Value) -> Value {
        if self.data { json!({ "data": body }) } else { body }
    }

    /// Wraps a get-all result.
    ///
    /// Paginated results carry `hasNext` and page metadata when page encapsulation is
    /// on. Everything else is wrapped like a single entity.
    pub fn page(&self, page: Page<Value>, paginated: bool) -> Value {
        if paginated && self.page {
            let mut envelope = Map::new();
            envelope.insert("data".to_string(), Value::Array(page.items));
            envelope.insert("hasNext".to_string(), Value::Bool(page.has_next));
            envelope.insert("page".to_string(), Value::from(page.page));
            envelope.insert("pageSize".to_string(), Value::from(page.page_size));
            envelope.insert("count".to_string(), Value::from(page.count));
            return Value::Object(envelope);
        }

        self.entity(Value::Array(page.items))
    }
}

/// Everything needed to build a success response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseParts {
    pub url: String,
    pub status: u16,
    pub status_text: &'static str,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

/// Everything needed to build an error response.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorParts {
    pub url: String,
    pub status: u16,
    pub status_text: &'static str,
    pub error: MockError,
}

impl ErrorParts {
    pub fn new(url: impl Into<String>, error: MockError) -> Self {
        let status = error.status();
        Self {
            url: url.into(),
            status,
            status_text: status_text(status),
            error,
        }
    }
}

/// Builds the embedder's response type from response parts.
pub trait ResponseFactory: Send + Sync {
    type Response;
    type Error;

    fn success(&self, parts: ResponseParts) -> Self::Response;
    fn failure(&self, parts: ErrorParts) -> Self::Error;
}

/// A plain response value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl MockResponse {
    /// First header value named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A plain error value. `error` is `{ "message": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockErrorResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub error: Value,
}

/// Factory producing [`MockResponse`] / [`MockErrorResponse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseFactory;

impl ResponseFactory for DefaultResponseFactory {
    type Response = MockResponse;
    type Error = MockErrorResponse;

    fn success(&self, parts: ResponseParts) -> MockResponse {
        MockResponse {
            url: parts.url,
            status: parts.status,
            status_text: parts.status_text.to_string(),
            body: parts.body,
            headers: parts.headers,
        }
    }

    fn failure(&self, parts: ErrorParts) -> MockErrorResponse {
        MockErrorResponse {
            url: parts.url,
            status: parts.status,
            status_text: parts.status_text.to_string(),
            error: json!({ "message": parts.error.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PaginationParams;
    use pretty_assertions::assert_eq;

    #[test]
    fn page_envelope_only_for_paginated_reads() {
        let config = EngineConfig::builder().page_encapsulation(true).build();
        let envelope = Envelope::new(&config);
        let page = PaginationParams::new(1, 2).paginate(vec![json!(1), json!(2), json!(3)]);

        assert_eq!(
            envelope.page(page.clone(), true),
            json!({ "data": [1, 2], "hasNext": true, "page": 1, "pageSize": 2, "count": 3 })
        );
        assert_eq!(envelope.page(page, false), json!([1, 2]));
    }

    #[test]
    fn data_envelope_wraps_entities() {
        let config = EngineConfig::builder().data_encapsulation(true).build();
        let envelope = Envelope::new(&config);

        assert_eq!(envelope.entity(json!({ "id": 1 })), json!({ "data": { "id": 1 } }));
    }

    #[test]
    fn default_factory_renders_errors() {
        let parts = ErrorParts::new("api/customers/9", MockError::EntityNotFound("9".into(), "customers".into()));
        let response = DefaultResponseFactory.failure(parts);

        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");
        assert_eq!(
            response.error,
            json!({ "message": "Collection 'customers' with id='9' not found" })
        );
    }
}
