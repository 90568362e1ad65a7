//! Query-string parsing.
//!
//! [`QueryParams`] is the ordered multimap a request's query string decodes into.
//! [`QueryParser`] turns it into a [`QuerySpec`] for one collection:
//!
//! - `orderBy=-customerId,identifier` builds composite order clauses (`-` for descending).
//! - `page` and `pageSize` build pagination.
//! - `name[]=a&name[]=b` builds an OR group over the values.
//! - `address.city=London`, where `address` is a join output field, builds a children
//!   filter tested against the joined entity.
//! - Any other key filters the field of the same name, using the collection's
//!   registered filter if there is one and a term match otherwise.
//!
//! Keys starting with `_` are treated as client noise (cache busters, method
//! overrides) and ignored.

use serde_json::{Number, Value};
use tracing::debug;

use crate::{
    config::{EngineConfig, RemapTrigger},
    page::PaginationParams,
    query::{Expr, Filter, OrderClause, QuerySpec, SortDirection},
    registry::{CollectionBehavior, FieldFilter, Registry},
};

/// Ordered multimap of decoded query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a raw query string (without the leading `?`).
    ///
    /// Percent escapes are decoded and `+` reads as a space. Pairs that fail to decode
    /// are kept verbatim.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.append(decode(key), decode(value));
        }

        params
    }

    /// Appends a value under `key`, keeping first-seen key order.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(key, value);
        self
    }

    /// All values of `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.append(key, value);
        }
        params
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Reads a query literal as the JSON value it most likely denotes.
pub fn literal_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }

    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Builds query specs from decoded parameters.
pub struct QueryParser<'a> {
    registry: &'a Registry,
    config: &'a EngineConfig,
}

impl<'a> QueryParser<'a> {
    pub fn new(registry: &'a Registry, config: &'a EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Builds the query spec for a get-all on `collection`.
    pub fn parse(&self, collection: &str, params: &QueryParams) -> QuerySpec {
        let behavior = self.registry.behavior(collection);
        let mut builder = QuerySpec::builder();
        let mut page = None;
        let mut page_size = None;

        for (key, values) in params.iter() {
            if key == self.config.order_key {
                for clause in self.order_clauses(values) {
                    builder = builder.order_clause(clause);
                }
                continue;
            }
            if key == self.config.page_key {
                page = values.first().and_then(|v| v.trim().parse::<usize>().ok());
                continue;
            }
            if key == self.config.page_size_key {
                page_size = values.first().and_then(|v| v.trim().parse::<usize>().ok());
                continue;
            }
            if self.is_ignored(behavior, key) {
                debug!(collection, key, "ignoring query parameter");
                continue;
            }

            let (field, any_of) = match key.strip_suffix("[]") {
                Some(field) => (field, true),
                None => (key, false),
            };

            // `<join field>.<path>` filters the joined entity instead of the entity itself.
            let child = field.split_once('.').and_then(|(head, rest)| {
                behavior
                    .join_for_field(head)
                    .map(|join| (join, rest))
            });

            match child {
                Some((join, path)) => {
                    let target = self.registry.behavior(&join.collection);
                    if let Some(expr) = self.filter(target, path, values, any_of) {
                        builder = builder.child_filter(join.field.clone(), expr);
                    }
                }
                None => {
                    if let Some(expr) = self.filter(behavior, field, values, any_of) {
                        builder = builder.filter(expr);
                    }
                }
            }
        }

        match (page, page_size) {
            (None, None) => {}
            (page, size) => {
                let defaults = PaginationParams::default();
                builder = builder.paginate(
                    page.unwrap_or(defaults.page),
                    size.filter(|size| *size > 0).unwrap_or(defaults.page_size),
                );
            }
        }

        builder.build()
    }

    fn order_clauses(&self, values: &[String]) -> Vec<OrderClause> {
        values
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| {
                let (field, direction) = match part.strip_prefix('-') {
                    Some(field) => (field, SortDirection::Desc),
                    None => (part.strip_prefix('+').unwrap_or(part), SortDirection::Asc),
                };
                (!field.is_empty())
                    .then(|| OrderClause::new(field, direction, self.config.case_sensitive_order))
            })
            .collect()
    }

    fn is_ignored(&self, behavior: &CollectionBehavior, key: &str) -> bool {
        if key.starts_with('_') {
            return true;
        }

        behavior
            .post_remaps
            .iter()
            .chain(self.config.post_remaps.iter())
            .any(|remap| matches!(&remap.trigger, RemapTrigger::QueryParam { name, .. } if name == key))
    }

    /// One expression over `field` for all of `values`: AND-ed normally, OR-ed for `[]` keys.
    fn filter(&self, behavior: &CollectionBehavior, field: &str, values: &[String], any_of: bool) -> Option<Expr> {
        let exprs: Vec<Expr> = values
            .iter()
            .filter(|value| !value.is_empty())
            .map(|value| self.field_filter(behavior, field, value))
            .collect();

        match exprs.len() {
            0 => None,
            1 => exprs.into_iter().next(),
            _ if any_of => Some(Filter::or(exprs)),
            _ => Some(Filter::and(exprs)),
        }
    }

    fn field_filter(&self, behavior: &CollectionBehavior, field: &str, value: &str) -> Expr {
        match behavior.filters.get(field) {
            Some(FieldFilter::Predicate(predicate)) => Filter::predicate(field, predicate.clone(), value),
            Some(FieldFilter::Operator(op)) => Filter::compare(field, *op, literal_value(value)),
            None => Filter::term(field, value, self.config.case_sensitive_search),
        }
    }
}
