//! DuckDB SQL dialect implementation

use super::SqlDialect;

/// DuckDB SQL dialect
pub struct DuckdbDialect;

impl SqlDialect for DuckdbDialect {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn timestamp_param(&self, placeholder: &str) -> String {
        format!("CAST({} AS TIMESTAMPTZ)", placeholder)
    }

    fn array_contains(&self, array_col: &str, placeholder: &str) -> String {
        format!("array_contains({}, {})", array_col, placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let dialect = DuckdbDialect;
        assert_eq!(dialect.placeholder(1), "?");
        assert_eq!(dialect.placeholder(5), "?");
    }

    #[test]
    fn test_array_contains() {
        let dialect = DuckdbDialect;
        assert_eq!(
            dialect.array_contains("\"tags\"", "?"),
            "array_contains(\"tags\", ?)"
        );
    }
}
