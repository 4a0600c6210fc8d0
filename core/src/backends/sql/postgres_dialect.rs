//! PostgreSQL SQL dialect implementation

use super::SqlDialect;

/// PostgreSQL SQL dialect
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn timestamp_param(&self, placeholder: &str) -> String {
        format!("CAST({} AS TIMESTAMPTZ)", placeholder)
    }

    fn array_contains(&self, array_col: &str, placeholder: &str) -> String {
        format!("{} = ANY({})", placeholder, array_col)
    }
}
