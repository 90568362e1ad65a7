//! Filter, order and paginate evaluation over plain entity sequences.
//!
//! Both backends hand the evaluator an [`EntityCursor`](crate::backend::EntityCursor),
//! a "yield next item or end" iterator of copies, so the algorithm never touches
//! backend-native storage.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::{cmp::Ordering, collections::HashMap};

use crate::{
    entity::lookup,
    error::{MockError, MockResult},
    query::{Expr, FieldComparator, FieldOp, FieldPredicate, OrderClause, QuerySpec, QueryVisitor, SortDirection, TermPattern},
};

/// Comparable view over JSON values.
///
/// Integers and floats are normalized to f64. Strings that parse as RFC 3339
/// timestamps compare chronologically.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime<FixedOffset>),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => value
                .as_f64()
                .map(Comparable::Number)
                .unwrap_or(Comparable::Null),
            Value::String(value) => match DateTime::parse_from_rfc3339(value) {
                Ok(timestamp) => Comparable::DateTime(timestamp),
                Err(_) => Comparable::String(value),
            },
            Value::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Value::Object(map) => Comparable::Map(
                map
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the default cross-type ordering.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::DateTime(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Default ordering between two field values.
///
/// Same-kind values compare naturally (strings case-folded unless `case_sensitive`).
/// Different kinds order null < bool < number < date < string < array < object,
/// so entities missing the field come first in ascending order.
pub fn default_compare(left: &Value, right: &Value, case_sensitive: bool) -> Ordering {
    let (left, right) = (Comparable::from(left), Comparable::from(right));

    match (&left, &right) {
        (Comparable::String(a), Comparable::String(b)) if !case_sensitive => {
            a.to_lowercase().cmp(&b.to_lowercase())
        }
        _ => match left.partial_cmp(&right) {
            Some(ordering) => ordering,
            None => left.rank().cmp(&right.rank()),
        },
    }
}

/// Text a term filter is matched against, if the value has one.
fn stringified(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tests a single entity against filter expressions.
pub(crate) struct EntityEvaluator<'a> {
    entity: &'a Value,
}

impl<'a> EntityEvaluator<'a> {
    pub fn new(entity: &'a Value) -> Self {
        Self { entity }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> MockResult<bool> {
        self.visit_expr(expr)
    }

    /// Whether `value` (possibly an array of candidates) passes `expr`.
    ///
    /// Used for joined values: an array passes if any element does.
    pub fn matches_joined(value: &Value, expr: &Expr) -> MockResult<bool> {
        match value {
            Value::Array(items) => {
                for item in items {
                    if EntityEvaluator::new(item).evaluate(expr)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Value::Object(_) => EntityEvaluator::new(value).evaluate(expr),
            _ => Ok(false),
        }
    }
}

impl<'a> QueryVisitor for EntityEvaluator<'a> {
    type Output = bool;
    type Error = MockError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Value) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.entity, field) else {
            return Ok(false);
        };
        let (left, right) = (Comparable::from(field_value), Comparable::from(value));

        Ok(match op {
            FieldOp::Eq => left == right,
            FieldOp::Ne => left != right,
            _ => match left.partial_cmp(&right) {
                Some(ordering) => op.accepts(ordering),
                None => false,
            },
        })
    }

    fn visit_term(&mut self, field: &str, pattern: &TermPattern) -> Result<Self::Output, Self::Error> {
        Ok(match lookup(self.entity, field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(stringified)
                .any(|text| pattern.is_match(&text)),
            Some(value) => stringified(value)
                .map(|text| pattern.is_match(&text))
                .unwrap_or(false),
            None => false,
        })
    }

    fn visit_predicate(
        &mut self,
        field: &str,
        predicate: &FieldPredicate,
        literal: &str,
    ) -> Result<Self::Output, Self::Error> {
        Ok(predicate.test(lookup(self.entity, field), literal))
    }
}

/// Filter and order evaluation over entity sequences.
pub struct Evaluator<'a> {
    comparators: &'a HashMap<String, FieldComparator>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator using the given per-field comparators.
    pub fn new(comparators: &'a HashMap<String, FieldComparator>) -> Self {
        Self { comparators }
    }

    /// Drains `entities`, keeping those that pass the root filter, then orders them.
    ///
    /// Pagination is left to the caller because joins may still drop items.
    pub fn select<I>(&self, entities: I, spec: &QuerySpec) -> MockResult<Vec<Value>>
    where
        I: IntoIterator<Item = MockResult<Value>>,
    {
        let mut selected = Vec::new();

        for entity in entities {
            let entity = entity?;
            let keep = match &spec.filter {
                Some(filter) => EntityEvaluator::new(&entity).evaluate(filter)?,
                None => true,
            };
            if keep {
                selected.push(entity);
            }
        }

        self.order(&mut selected, &spec.order);

        Ok(selected)
    }

    /// Stable composite sort: each clause only breaks the ties of the previous one.
    pub fn order(&self, entities: &mut [Value], clauses: &[OrderClause]) {
        if clauses.is_empty() {
            return;
        }

        entities.sort_by(|a, b| {
            for clause in clauses {
                let left = lookup(a, &clause.field).unwrap_or(&Value::Null);
                let right = lookup(b, &clause.field).unwrap_or(&Value::Null);

                let ordering = match self.comparators.get(&clause.field) {
                    Some(comparator) => comparator.compare(left, right, clause.case_sensitive),
                    None => default_compare(left, right, clause.case_sensitive),
                };
                let ordering = match clause.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };

                if ordering != Ordering::Equal {
                    return ordering;
                }
            }

            Ordering::Equal
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ok(values: Vec<Value>) -> Vec<MockResult<Value>> {
        values.into_iter().map(Ok).collect()
    }

    fn ids(values: &[Value]) -> Vec<i64> {
        values.iter().filter_map(|v| v["id"].as_i64()).collect()
    }

    #[test]
    fn composite_order_breaks_ties_in_sequence() {
        let entities = vec![
            json!({ "id": 1, "customerId": 1, "identifier": "a" }),
            json!({ "id": 2, "customerId": 2, "identifier": "b" }),
            json!({ "id": 3, "customerId": 3, "identifier": "c" }),
            json!({ "id": 4, "customerId": 1, "identifier": "d" }),
            json!({ "id": 5, "customerId": 2, "identifier": "e" }),
        ];
        let spec = QuerySpec::builder()
            .order_by("customerId", SortDirection::Asc)
            .order_by("identifier", SortDirection::Desc)
            .build();
        let comparators = HashMap::new();

        let result = Evaluator::new(&comparators).select(ok(entities), &spec).unwrap();

        assert_eq!(ids(&result), vec![4, 1, 5, 2, 3]);
    }

    #[test]
    fn custom_comparator_wins_over_default() {
        let entities = vec![
            json!({ "id": 1, "size": "small" }),
            json!({ "id": 2, "size": "large" }),
            json!({ "id": 3, "size": "medium" }),
        ];
        let rank = |v: &Value| match v.as_str() {
            Some("small") => 0,
            Some("medium") => 1,
            _ => 2,
        };
        let mut comparators = HashMap::new();
        comparators.insert(
            "size".to_string(),
            FieldComparator::new(move |a, b, _| rank(a).cmp(&rank(b))),
        );
        let spec = QuerySpec::builder().order_by("size", SortDirection::Asc).build();

        let result = Evaluator::new(&comparators).select(ok(entities), &spec).unwrap();

        assert_eq!(ids(&result), vec![1, 3, 2]);
    }

    #[test]
    fn comparator_receives_case_flag() {
        let comparators = HashMap::from([(
            "name".to_string(),
            FieldComparator::new(|a, b, case_sensitive| {
                assert!(case_sensitive);
                default_compare(a, b, true)
            }),
        )]);
        let mut entities = vec![json!({ "id": 1, "name": "b" }), json!({ "id": 2, "name": "B" })];

        Evaluator::new(&comparators).order(
            &mut entities,
            &[OrderClause::new("name", SortDirection::Asc, true)],
        );

        assert_eq!(ids(&entities), vec![2, 1]);
    }

    #[test]
    fn dates_order_chronologically() {
        let mut entities = vec![
            json!({ "id": 1, "at": "2024-03-01T00:00:00+02:00" }),
            json!({ "id": 2, "at": "2024-02-29T23:30:00Z" }),
        ];
        let comparators = HashMap::new();

        Evaluator::new(&comparators).order(
            &mut entities,
            &[OrderClause::new("at", SortDirection::Asc, false)],
        );

        assert_eq!(ids(&entities), vec![1, 2]);
    }

    #[test]
    fn missing_field_is_a_non_match() {
        let entities = vec![json!({ "id": 1, "name": "x" }), json!({ "id": 2 })];
        let spec = QuerySpec::builder().filter(Filter::term("name", "x", false)).build();
        let comparators = HashMap::new();

        let result = Evaluator::new(&comparators).select(ok(entities), &spec).unwrap();

        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn predicate_sees_absent_fields() {
        let entities = vec![json!({ "id": 1, "tag": "x" }), json!({ "id": 2 })];
        let untagged = FieldPredicate::new(|value, _| value.is_none());
        let spec = QuerySpec::builder()
            .filter(Filter::predicate("tag", untagged, "anything"))
            .build();
        let comparators = HashMap::new();

        let result = Evaluator::new(&comparators).select(ok(entities), &spec).unwrap();

        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn or_groups_need_one_match() {
        let entities = vec![
            json!({ "id": 1, "status": "open", "owner": "ann" }),
            json!({ "id": 2, "status": "closed", "owner": "ann" }),
            json!({ "id": 3, "status": "stale", "owner": "ann" }),
            json!({ "id": 4, "status": "open", "owner": "bob" }),
        ];
        let spec = QuerySpec::builder()
            .filter(Filter::or([
                Filter::eq("status", "open"),
                Filter::eq("status", "closed"),
            ]))
            .filter(Filter::eq("owner", "ann"))
            .build();
        let comparators = HashMap::new();

        let result = Evaluator::new(&comparators).select(ok(entities), &spec).unwrap();

        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn typed_comparisons() {
        let entities = vec![json!({ "id": 1, "age": 17 }), json!({ "id": 2, "age": 18 }), json!({ "id": 3, "age": 40 })];
        let spec = QuerySpec::builder().filter(Filter::ge("age", 18)).build();
        let comparators = HashMap::new();

        let result = Evaluator::new(&comparators).select(ok(entities), &spec).unwrap();

        assert_eq!(ids(&result), vec![2, 3]);
    }

    #[test]
    fn cursor_errors_propagate() {
        let entities: Vec<MockResult<Value>> = vec![
            Ok(json!({ "id": 1 })),
            Err(MockError::Backend("cursor closed".into())),
        ];
        let comparators = HashMap::new();

        let result = Evaluator::new(&comparators).select(entities, &QuerySpec::new());

        assert_eq!(result, Err(MockError::Backend("cursor closed".into())));
    }
}
