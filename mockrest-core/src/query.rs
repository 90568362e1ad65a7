//! Query model: filters, ordering and pagination.
//!
//! A [`QuerySpec`] is derived per request, either by the parameters parser
//! ([`crate::params`]) or programmatically with the fluent builder:
//!
//! ```ignore
//! use mockrest::query::{QuerySpec, Filter, SortDirection};
//!
//! let spec = QuerySpec::builder()
//!     .filter(Filter::term("name", "23451", false))
//!     .order_by("customerId", SortDirection::Asc)
//!     .order_by("identifier", SortDirection::Desc)
//!     .paginate(1, 10)
//!     .build();
//! ```
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors for filter expressions:
//!
//! - Comparison: `eq`, `ne`, `gt`, `ge`, `lt`, `le`
//! - Term matching: `term` (regex or substring match on the stringified value)
//! - Custom: `predicate` (a registered [`FieldPredicate`])
//! - Logical: `and`, `or`
//!
//! Filters are evaluated through the [`QueryVisitor`] trait.

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::{cmp::Ordering, collections::BTreeMap, fmt, sync::Arc};

use crate::{error::MockError, page::PaginationParams};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One clause of a composite ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    /// The field name (dotted paths allowed) to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
    /// Whether string comparison respects case.
    pub case_sensitive: bool,
}

impl OrderClause {
    pub fn new(field: impl Into<String>, direction: SortDirection, case_sensitive: bool) -> Self {
        Self { field: field.into(), direction, case_sensitive }
    }
}

/// Built-in comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Ge,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Le,
}

impl FieldOp {
    /// Parses the short operator names used in configuration (`eq`, `ne`, `gt`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(FieldOp::Eq),
            "ne" => Some(FieldOp::Ne),
            "gt" => Some(FieldOp::Gt),
            "ge" => Some(FieldOp::Ge),
            "lt" => Some(FieldOp::Lt),
            "le" => Some(FieldOp::Le),
            _ => None,
        }
    }

    /// Whether an ordering between field value and literal satisfies the operator.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            FieldOp::Eq => ordering == Ordering::Equal,
            FieldOp::Ne => ordering != Ordering::Equal,
            FieldOp::Gt => ordering == Ordering::Greater,
            FieldOp::Ge => ordering != Ordering::Less,
            FieldOp::Lt => ordering == Ordering::Less,
            FieldOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// A term pattern matched against the stringified value of a field.
///
/// The term is used as a regular expression when it compiles, and as a literal
/// substring otherwise.
#[derive(Debug, Clone)]
pub struct TermPattern {
    source: String,
    matcher: TermMatcher,
}

#[derive(Debug, Clone)]
enum TermMatcher {
    Regex(Regex),
    Literal { needle: String, case_sensitive: bool },
}

impl TermPattern {
    pub fn new(term: &str, case_sensitive: bool) -> Self {
        let matcher = match RegexBuilder::new(term)
            .case_insensitive(!case_sensitive)
            .build()
        {
            Ok(regex) => TermMatcher::Regex(regex),
            Err(_) => TermMatcher::Literal {
                needle: if case_sensitive { term.to_string() } else { term.to_lowercase() },
                case_sensitive,
            },
        };

        Self { source: term.to_string(), matcher }
    }

    /// The term as written by the caller.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            TermMatcher::Regex(regex) => regex.is_match(text),
            TermMatcher::Literal { needle, case_sensitive: true } => text.contains(needle.as_str()),
            TermMatcher::Literal { needle, case_sensitive: false } => {
                text.to_lowercase().contains(needle.as_str())
            }
        }
    }
}

type PredicateFn = dyn Fn(Option<&Value>, &str) -> bool + Send + Sync;
type ComparatorFn = dyn Fn(&Value, &Value, bool) -> Ordering + Send + Sync;

/// A custom filter function registered for a field.
///
/// It receives the raw field value (`None` when the entity lacks the field) and the
/// literal from the query, and decides whether the entity passes.
#[derive(Clone)]
pub struct FieldPredicate(Arc<PredicateFn>);

impl FieldPredicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>, &str) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn test(&self, value: Option<&Value>, literal: &str) -> bool {
        (self.0)(value, literal)
    }
}

impl fmt::Debug for FieldPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldPredicate(..)")
    }
}

/// A custom comparator registered for a field.
///
/// Missing fields are passed as `Value::Null`. The flag tells whether the clause is
/// case-sensitive.
#[derive(Clone)]
pub struct FieldComparator(Arc<ComparatorFn>);

impl FieldComparator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value, bool) -> Ordering + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn compare(&self, left: &Value, right: &Value, case_sensitive: bool) -> Ordering {
        (self.0)(left, right, case_sensitive)
    }
}

impl fmt::Debug for FieldComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldComparator(..)")
    }
}

/// A filter expression over an entity.
///
/// Expressions combine with `And` and `Or`.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Typed comparison against a literal.
    Field {
        field: String,
        op: FieldOp,
        value: Value,
    },
    /// Regex/substring match against the stringified field value.
    Term { field: String, pattern: TermPattern },
    /// Custom predicate registered for the field.
    Predicate {
        field: String,
        predicate: FieldPredicate,
        literal: String,
    },
}

impl Expr {
    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }
}

/// Static constructors for filter expressions.
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Filter::compare(field, FieldOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Filter::compare(field, FieldOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Filter::compare(field, FieldOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Filter::compare(field, FieldOp::Ge, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Filter::compare(field, FieldOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Filter::compare(field, FieldOp::Le, value)
    }

    /// Creates a typed comparison expression with an explicit operator.
    pub fn compare(field: impl Into<String>, op: FieldOp, value: impl Into<Value>) -> Expr {
        Expr::Field { field: field.into(), op, value: value.into() }
    }

    /// Matches documents whose stringified field value matches `term`.
    pub fn term(field: impl Into<String>, term: &str, case_sensitive: bool) -> Expr {
        Expr::Term { field: field.into(), pattern: TermPattern::new(term, case_sensitive) }
    }

    /// Matches documents accepted by a custom predicate.
    pub fn predicate(field: impl Into<String>, predicate: FieldPredicate, literal: impl Into<String>) -> Expr {
        Expr::Predicate { field: field.into(), predicate, literal: literal.into() }
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

/// A structured query over one collection.
///
/// `filter` applies to the collection's own entities. `children` holds filters keyed by
/// a join's output field; they are applied to the joined value once the join is
/// materialized.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    /// Filter over the root entities.
    pub filter: Option<Expr>,
    /// Filters over joined values, keyed by join output field.
    pub children: BTreeMap<String, Expr>,
    /// Composite ordering, highest precedence first.
    pub order: Vec<OrderClause>,
    /// Optional pagination.
    pub pagination: Option<PaginationParams>,
}

impl QuerySpec {
    /// Creates an empty query: everything, storage order, no pagination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QuerySpecBuilder {
        QuerySpecBuilder::new()
    }

    /// Whether any filter must be evaluated against joined values.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuerySpecBuilder {
    query: QuerySpec,
}

impl QuerySpecBuilder {
    pub fn new() -> Self {
        QuerySpecBuilder { query: QuerySpec::default() }
    }

    /// Adds a root filter, ANDed with any existing one.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(match self.query.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Adds a filter over the value joined under `join_field`.
    pub fn child_filter(mut self, join_field: impl Into<String>, filter: Expr) -> Self {
        let join_field = join_field.into();
        let combined = match self.query.children.remove(&join_field) {
            Some(existing) => existing.and(filter),
            None => filter,
        };
        self.query.children.insert(join_field, combined);
        self
    }

    /// Appends an order clause using the case-insensitive default.
    pub fn order_by(self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_clause(OrderClause::new(field, direction, false))
    }

    pub fn order_clause(mut self, clause: OrderClause) -> Self {
        self.query.order.push(clause);
        self
    }

    /// Sets 1-based pagination.
    pub fn paginate(mut self, page: usize, page_size: usize) -> Self {
        self.query.pagination = Some(PaginationParams::new(page, page_size));
        self
    }

    pub fn build(self) -> QuerySpec {
        self.query
    }
}

/// Visitor over filter expressions.
///
/// The in-crate evaluator implements it to test entities; other consumers can
/// translate expressions into their own representation.
pub trait QueryVisitor {
    type Output;
    type Error: Into<MockError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Value) -> Result<Self::Output, Self::Error>;
    fn visit_term(&mut self, field: &str, pattern: &TermPattern) -> Result<Self::Output, Self::Error>;
    fn visit_predicate(
        &mut self,
        field: &str,
        predicate: &FieldPredicate,
        literal: &str,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
            Expr::Term { field, pattern } => self.visit_term(field, pattern),
            Expr::Predicate { field, predicate, literal } => {
                self.visit_predicate(field, predicate, literal)
            }
        }
    }
}
