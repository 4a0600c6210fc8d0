//! Composer producing SQL predicates

use chrono::{DateTime, Utc};

use super::predicate::PARAM;
use super::{RenderedSql, SqlBackend, SqlDialect, SqlPredicate, SqlValue};
use crate::composer::QueryComposer;
use crate::error::ResolveError;
use crate::rules::{FieldComparison, FieldComposer};
use crate::time::TimePeriodOperator;
use crate::types::SegmentValue;

/// Escape special characters in LIKE patterns
///
/// Backslash is the escape character, so `%`, `_` and `\` match literally.
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Builds `WHERE` predicates for one SQL backend
///
/// Field names are quoted as identifiers by the backend's dialect; values are
/// always bound as parameters.
#[derive(Debug, Clone, Copy)]
pub struct SqlComposer {
    backend: SqlBackend,
}

impl SqlComposer {
    pub fn new(backend: SqlBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> SqlBackend {
        self.backend
    }

    fn dialect(&self) -> &'static dyn SqlDialect {
        self.backend.dialect()
    }

    fn column(&self, field: &str) -> String {
        self.dialect().quote_identifier(field)
    }

    /// Number the predicate's parameters for this backend
    pub fn render(&self, predicate: &SqlPredicate) -> RenderedSql {
        predicate.render(self.dialect())
    }

    fn compare(&self, field: &str, symbol: &str, value: SqlValue) -> SqlPredicate {
        SqlPredicate::new(
            format!("{} {} {}", self.column(field), symbol, PARAM),
            vec![value],
        )
    }

    fn compare_instant(
        &self,
        field: &str,
        operator: TimePeriodOperator,
        value: DateTime<Utc>,
    ) -> SqlPredicate {
        let param = self.dialect().timestamp_param(&PARAM.to_string());
        SqlPredicate::new(
            format!("{} {} {}", self.column(field), operator.symbol(), param),
            vec![SqlValue::Timestamp(value)],
        )
    }
}

impl QueryComposer for SqlComposer {
    type Query = SqlPredicate;

    fn compose_and_query(&self, queries: Vec<SqlPredicate>) -> SqlPredicate {
        SqlPredicate::and(queries)
    }

    fn compose_or_query(&self, queries: Vec<SqlPredicate>) -> SqlPredicate {
        SqlPredicate::or(queries)
    }

    fn compose_not_query(&self, queries: Vec<SqlPredicate>) -> SqlPredicate {
        SqlPredicate::not(queries)
    }

    /// Rows where `field` differs from `value`, including rows where it is NULL
    fn negate_query(&self, field: &str, value: &SegmentValue) -> SqlPredicate {
        let col = self.column(field);
        if value.is_null() {
            return SqlPredicate::raw(format!("{} IS NOT NULL", col));
        }
        SqlPredicate::new(
            format!("({} IS NULL OR {} <> {})", col, col, PARAM),
            vec![SqlValue::from(value)],
        )
    }

    fn compose_time_period_query(
        &self,
        field: &str,
        value: DateTime<Utc>,
        operator: TimePeriodOperator,
        negate: bool,
    ) -> Result<SqlPredicate, ResolveError> {
        let operator = if negate { operator.negated() } else { operator };
        Ok(self.compare_instant(field, operator, value))
    }

    fn compose_time_range_query(
        &self,
        field: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SqlPredicate, ResolveError> {
        Ok(SqlPredicate::and(vec![
            self.compare_instant(field, TimePeriodOperator::Gte, start),
            self.compare_instant(field, TimePeriodOperator::Lte, end),
        ]))
    }

    fn compose_fixed_time_period_query(
        &self,
        field: &str,
        value: DateTime<Utc>,
        operator: TimePeriodOperator,
    ) -> Result<SqlPredicate, ResolveError> {
        Ok(self.compare_instant(field, operator, value))
    }

    /// SQL has no structural merge; sibling predicates are conjoined
    fn combine_queries(&self, queries: Vec<SqlPredicate>) -> Result<SqlPredicate, ResolveError> {
        Ok(SqlPredicate::and(queries))
    }
}

impl FieldComposer for SqlComposer {
    fn compose_field_query(
        &self,
        field: &str,
        comparison: FieldComparison,
        value: &SegmentValue,
    ) -> SqlPredicate {
        let col = self.column(field);
        match (comparison, value) {
            (FieldComparison::Eq, SegmentValue::Null) => {
                SqlPredicate::raw(format!("{} IS NULL", col))
            }
            (FieldComparison::Ne, SegmentValue::Null) => {
                SqlPredicate::raw(format!("{} IS NOT NULL", col))
            }
            (FieldComparison::Eq, v) => self.compare(field, "=", v.into()),
            (FieldComparison::Ne, v) => self.compare(field, "<>", v.into()),
            (FieldComparison::Gt, v) => self.compare(field, ">", v.into()),
            (FieldComparison::Gte, v) => self.compare(field, ">=", v.into()),
            (FieldComparison::Lt, v) => self.compare(field, "<", v.into()),
            (FieldComparison::Lte, v) => self.compare(field, "<=", v.into()),
            (FieldComparison::Contains, SegmentValue::Text(s)) => SqlPredicate::new(
                format!("{} LIKE {}{}", col, PARAM, self.dialect().like_escape()),
                vec![SqlValue::Text(format!("%{}%", escape_like_pattern(s)))],
            ),
            (FieldComparison::Contains, v) => SqlPredicate::new(
                self.dialect().array_contains(&col, &PARAM.to_string()),
                vec![v.into()],
            ),
        }
    }

    fn match_all(&self) -> SqlPredicate {
        SqlPredicate::raw("1 = 1")
    }

    fn match_none(&self) -> SqlPredicate {
        SqlPredicate::raw("1 = 0")
    }
}
