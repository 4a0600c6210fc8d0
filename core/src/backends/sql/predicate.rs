//! Dialect-neutral SQL fragments

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SqlDialect;
use crate::types::SegmentValue;

/// Marker standing in for a parameter until rendering
pub(super) const PARAM: char = '?';

/// Bound parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<&SegmentValue> for SqlValue {
    fn from(value: &SegmentValue) -> Self {
        match value {
            SegmentValue::Null => SqlValue::Null,
            SegmentValue::Bool(b) => SqlValue::Bool(*b),
            SegmentValue::Int(i) => SqlValue::Int(*i),
            SegmentValue::Float(f) => SqlValue::Float(*f),
            SegmentValue::Text(s) => SqlValue::Text(s.clone()),
        }
    }
}

/// Boolean SQL expression with its parameters in marker order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Predicate rendered for one dialect
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlPredicate {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Predicate without parameters
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn and(predicates: Vec<Self>) -> Self {
        Self::join(predicates, "AND")
    }

    pub fn or(predicates: Vec<Self>) -> Self {
        Self::join(predicates, "OR")
    }

    /// Negation of the conjunction of `predicates`
    pub fn not(predicates: Vec<Self>) -> Self {
        let inner = if predicates.len() == 1 {
            let single = Self::join(predicates, "AND");
            Self::new(format!("({})", single.sql), single.params)
        } else {
            Self::join(predicates, "AND")
        };
        Self::new(format!("NOT {}", inner.sql), inner.params)
    }

    /// Parenthesized join; a single predicate is returned unchanged
    fn join(mut predicates: Vec<Self>, keyword: &str) -> Self {
        if predicates.len() == 1 {
            return predicates.remove(0);
        }
        let mut parts = Vec::with_capacity(predicates.len());
        let mut params = Vec::new();
        for predicate in predicates {
            parts.push(predicate.sql);
            params.extend(predicate.params);
        }
        let separator = format!(" {} ", keyword);
        Self::new(format!("({})", parts.join(&separator)), params)
    }

    /// Replace parameter markers with `dialect` placeholders, numbered from 1.
    ///
    /// Markers inside quoted identifiers or string literals are left alone.
    pub fn render(&self, dialect: &dyn SqlDialect) -> RenderedSql {
        let mut sql = String::with_capacity(self.sql.len() + self.params.len() * 2);
        let mut quote: Option<char> = None;
        let mut index = 0;

        for c in self.sql.chars() {
            match quote {
                Some(q) if c == q => {
                    quote = None;
                    sql.push(c);
                }
                Some(_) => sql.push(c),
                None if matches!(c, '\'' | '"' | '`') => {
                    quote = Some(c);
                    sql.push(c);
                }
                None if c == PARAM => {
                    index += 1;
                    sql.push_str(&dialect.placeholder(index));
                }
                None => sql.push(c),
            }
        }

        debug_assert_eq!(index, self.params.len(), "parameter count mismatch");
        RenderedSql {
            sql,
            params: self.params.clone(),
        }
    }
}
