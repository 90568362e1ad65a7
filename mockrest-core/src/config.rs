//! Engine configuration.
//!
//! [`EngineConfig`] holds every policy knob the engine recognizes. It deserializes from
//! the camelCase JSON shape mock backends are usually configured with, and every field
//! has a default so partial documents are accepted:
//!
//! ```ignore
//! let config: EngineConfig = serde_json::from_str(r#"{ "post409": true, "delay": 50 }"#)?;
//! ```
//!
//! The [`EngineConfigBuilder`] offers the same settings fluently.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

use crate::router::Method;

/// Policy governing how missing ids are assigned on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// The caller must supply the id. Ids are textual.
    Provided,
    /// Highest numeric id in the collection plus one, starting at 1.
    #[default]
    Autoincrement,
    /// A random v4 UUID string.
    Uuid,
}

/// What makes a POST request count as another method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RemapTrigger {
    /// The last URL segment equals `segment` (`POST customers/5/delete`).
    UrlSegment { segment: String },
    /// The query parameter `name` has value `value` (`?_method=DELETE`).
    QueryParam { name: String, value: String },
    /// The body field `name` has value `value`. The field is removed from the body.
    BodyField { name: String, value: String },
}

/// Remapping of a POST request onto PUT or DELETE semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRemap {
    pub trigger: RemapTrigger,
    pub method: Method,
}

impl PostRemap {
    pub fn url_segment(segment: impl Into<String>, method: Method) -> Self {
        Self { trigger: RemapTrigger::UrlSegment { segment: segment.into() }, method }
    }

    pub fn query_param(name: impl Into<String>, value: impl Into<String>, method: Method) -> Self {
        Self {
            trigger: RemapTrigger::QueryParam { name: name.into(), value: value.into() },
            method,
        }
    }

    pub fn body_field(name: impl Into<String>, value: impl Into<String>, method: Method) -> Self {
        Self {
            trigger: RemapTrigger::BodyField { name: name.into(), value: value.into() },
            method,
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Id strategy for collections that do not register their own.
    pub strategy_id: IdStrategy,
    /// Creating an existing id fails with 409 instead of updating it.
    pub post409: bool,
    /// Updating a missing id fails with 404 instead of creating it.
    pub put404: bool,
    /// Deleting a missing id fails with 404 instead of answering 204.
    pub delete404: bool,
    /// Updates merge into the stored entity instead of replacing it.
    pub append_put: bool,
    /// A create that hits an existing id merges instead of replacing.
    pub append_existing_post: bool,
    /// 201 responses carry the created entity rather than only its id.
    pub return_item_in201: bool,
    /// Successful updates answer 204 without a body instead of 200 with the entity.
    pub put204: bool,
    /// Paginated reads are wrapped with `hasNext` and page metadata.
    pub page_encapsulation: bool,
    /// Bodies are wrapped in `{ "data": ... }`.
    pub data_encapsulation: bool,
    /// Simulated latency added to every routed response, in milliseconds.
    pub delay: u64,
    /// Default term filters match case-sensitively.
    pub case_sensitive_search: bool,
    /// Default ordering compares strings case-sensitively.
    pub case_sensitive_order: bool,
    /// Leading path segment(s) stripped before routing, e.g. `api` or `api/v1`.
    pub root_path: Option<String>,
    /// Query key holding order clauses.
    pub order_key: String,
    /// Query key holding the 1-based page number.
    pub page_key: String,
    /// Query key holding the page size.
    pub page_size_key: String,
    /// URL segments rewritten before routing, applied to every collection.
    pub segment_replacements: HashMap<String, String>,
    /// POST remaps applied to every collection.
    pub post_remaps: Vec<PostRemap>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy_id: IdStrategy::default(),
            post409: false,
            put404: false,
            delete404: false,
            append_put: false,
            append_existing_post: false,
            return_item_in201: true,
            put204: true,
            page_encapsulation: false,
            data_encapsulation: false,
            delay: 0,
            case_sensitive_search: false,
            case_sensitive_order: false,
            root_path: Some("api".to_string()),
            order_key: "orderBy".to_string(),
            page_key: "page".to_string(),
            page_size_key: "pageSize".to_string(),
            segment_replacements: HashMap::new(),
            post_remaps: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Creates a new builder starting from the defaults.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// The configured latency, if any.
    pub fn delay(&self) -> Option<Duration> {
        (self.delay > 0).then(|| Duration::from_millis(self.delay))
    }
}

/// Fluent builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self { config: EngineConfig::default() }
    }

    pub fn strategy_id(mut self, strategy: IdStrategy) -> Self {
        self.config.strategy_id = strategy;
        self
    }

    pub fn post409(mut self, value: bool) -> Self {
        self.config.post409 = value;
        self
    }

    pub fn put404(mut self, value: bool) -> Self {
        self.config.put404 = value;
        self
    }

    pub fn delete404(mut self, value: bool) -> Self {
        self.config.delete404 = value;
        self
    }

    pub fn append_put(mut self, value: bool) -> Self {
        self.config.append_put = value;
        self
    }

    pub fn append_existing_post(mut self, value: bool) -> Self {
        self.config.append_existing_post = value;
        self
    }

    pub fn return_item_in201(mut self, value: bool) -> Self {
        self.config.return_item_in201 = value;
        self
    }

    pub fn put204(mut self, value: bool) -> Self {
        self.config.put204 = value;
        self
    }

    pub fn page_encapsulation(mut self, value: bool) -> Self {
        self.config.page_encapsulation = value;
        self
    }

    pub fn data_encapsulation(mut self, value: bool) -> Self {
        self.config.data_encapsulation = value;
        self
    }

    /// Sets the simulated latency in milliseconds.
    pub fn delay(mut self, millis: u64) -> Self {
        self.config.delay = millis;
        self
    }

    pub fn case_sensitive_search(mut self, value: bool) -> Self {
        self.config.case_sensitive_search = value;
        self
    }

    pub fn case_sensitive_order(mut self, value: bool) -> Self {
        self.config.case_sensitive_order = value;
        self
    }

    /// Sets the root path stripped before routing. `None` routes from the first segment.
    pub fn root_path(mut self, root: Option<&str>) -> Self {
        self.config.root_path = root.map(str::to_string);
        self
    }

    pub fn segment_replacement(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.segment_replacements.insert(from.into(), to.into());
        self
    }

    pub fn post_remap(mut self, remap: PostRemap) -> Self {
        self.config.post_remaps.push(remap);
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
