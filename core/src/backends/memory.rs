//! In-memory predicates
//!
//! [`MemoryComposer`] produces a [`Predicate`] tree that can be evaluated
//! directly against JSON records, which is handy for tests, previews and
//! small datasets that never reach a database.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::composer::QueryComposer;
use crate::error::ResolveError;
use crate::rules::{FieldComparison, FieldComposer};
use crate::time::{ReferenceDate, TimePeriodOperator};
use crate::types::SegmentValue;

/// Filter evaluated against a JSON record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    All,
    None,
    And {
        predicates: Vec<Predicate>,
    },
    Or {
        predicates: Vec<Predicate>,
    },
    /// Negation of the conjunction of `predicates`
    Not {
        predicates: Vec<Predicate>,
    },
    Compare {
        field: String,
        comparison: FieldComparison,
        value: Value,
    },
    Time {
        field: String,
        operator: TimePeriodOperator,
        value: DateTime<Utc>,
    },
    TimeRange {
        field: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Look up a dotted path (`address.city`) in `record`
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |current, key| current.get(key))
}

/// Read a record value as an instant: RFC 3339 / date strings or epoch millis
fn as_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => match ReferenceDate::parse(s).ok()? {
            ReferenceDate::Fixed(at) => Some(at),
            ReferenceDate::Now => None,
        },
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare(actual: Option<&Value>, comparison: FieldComparison, expected: &Value) -> bool {
    let actual = actual.unwrap_or(&Value::Null);
    match comparison {
        FieldComparison::Eq => values_equal(actual, expected),
        FieldComparison::Ne => !values_equal(actual, expected),
        FieldComparison::Gt => order(actual, expected) == Some(Ordering::Greater),
        FieldComparison::Gte => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FieldComparison::Lt => order(actual, expected) == Some(Ordering::Less),
        FieldComparison::Lte => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FieldComparison::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
            _ => false,
        },
    }
}

impl Predicate {
    /// Whether `record` satisfies this predicate
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Predicate::All => true,
            Predicate::None => false,
            Predicate::And { predicates } => predicates.iter().all(|p| p.matches(record)),
            Predicate::Or { predicates } => predicates.iter().any(|p| p.matches(record)),
            Predicate::Not { predicates } => !predicates.iter().all(|p| p.matches(record)),
            Predicate::Compare {
                field,
                comparison,
                value,
            } => compare(lookup(record, field), *comparison, value),
            Predicate::Time {
                field,
                operator,
                value,
            } => lookup(record, field)
                .and_then(as_instant)
                .is_some_and(|at| operator.compare(&at, value)),
            Predicate::TimeRange { field, start, end } => lookup(record, field)
                .and_then(as_instant)
                .is_some_and(|at| *start <= at && at <= *end),
        }
    }

    /// Records satisfying this predicate, in input order
    pub fn filter<'a>(&self, records: &'a [Value]) -> Vec<&'a Value> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryComposer;

impl QueryComposer for MemoryComposer {
    type Query = Predicate;

    fn compose_and_query(&self, queries: Vec<Predicate>) -> Predicate {
        Predicate::And {
            predicates: queries,
        }
    }

    fn compose_or_query(&self, queries: Vec<Predicate>) -> Predicate {
        Predicate::Or {
            predicates: queries,
        }
    }

    fn compose_not_query(&self, queries: Vec<Predicate>) -> Predicate {
        Predicate::Not {
            predicates: queries,
        }
    }

    fn negate_query(&self, field: &str, value: &SegmentValue) -> Predicate {
        self.compose_field_query(field, FieldComparison::Ne, value)
    }

    /// Negation is an exact complement, so records without the field match
    fn compose_time_period_query(
        &self,
        field: &str,
        value: DateTime<Utc>,
        operator: TimePeriodOperator,
        negate: bool,
    ) -> Result<Predicate, ResolveError> {
        let predicate = Predicate::Time {
            field: field.to_string(),
            operator,
            value,
        };
        if negate {
            return Ok(Predicate::Not {
                predicates: vec![predicate],
            });
        }
        Ok(predicate)
    }

    fn compose_time_range_query(
        &self,
        field: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Predicate, ResolveError> {
        Ok(Predicate::TimeRange {
            field: field.to_string(),
            start,
            end,
        })
    }

    fn compose_fixed_time_period_query(
        &self,
        field: &str,
        value: DateTime<Utc>,
        operator: TimePeriodOperator,
    ) -> Result<Predicate, ResolveError> {
        Ok(Predicate::Time {
            field: field.to_string(),
            operator,
            value,
        })
    }

    /// Flattens nested conjunctions into one
    fn combine_queries(&self, queries: Vec<Predicate>) -> Result<Predicate, ResolveError> {
        let mut predicates = Vec::with_capacity(queries.len());
        for query in queries {
            match query {
                Predicate::And { predicates: inner } => predicates.extend(inner),
                Predicate::All => {}
                other => predicates.push(other),
            }
        }
        Ok(Predicate::And { predicates })
    }
}

impl FieldComposer for MemoryComposer {
    fn compose_field_query(
        &self,
        field: &str,
        comparison: FieldComparison,
        value: &SegmentValue,
    ) -> Predicate {
        Predicate::Compare {
            field: field.to_string(),
            comparison,
            value: value.to_json(),
        }
    }

    fn match_all(&self) -> Predicate {
        Predicate::All
    }

    fn match_none(&self) -> Predicate {
        Predicate::None
    }
}
