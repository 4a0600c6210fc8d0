//! ClickHouse SQL dialect implementation

use super::SqlDialect;

/// ClickHouse SQL dialect
pub struct ClickhouseDialect;

impl SqlDialect for ClickhouseDialect {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn placeholder(&self, _index: usize) -> String {
        // ClickHouse uses ? for positional parameters
        "?".to_string()
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn timestamp_param(&self, placeholder: &str) -> String {
        format!("parseDateTime64BestEffort({}, 6)", placeholder)
    }

    fn array_contains(&self, array_col: &str, placeholder: &str) -> String {
        format!("has({}, {})", array_col, placeholder)
    }

    fn like_escape(&self) -> &'static str {
        ""
    }
}
