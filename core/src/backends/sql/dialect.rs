//! SQL dialect trait for multi-database support
//!
//! Only the syntax a filter predicate needs differs per database: parameter
//! placeholders, identifier quoting, timestamp parameters, array membership
//! and the LIKE escape clause.

/// SQL dialect trait for generating database-specific predicate syntax
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Generate a parameter placeholder for the given index (1-based)
    ///
    /// - SQLite/DuckDB/ClickHouse: Always returns "?"
    /// - PostgreSQL: Returns "$1", "$2", etc.
    fn placeholder(&self, index: usize) -> String;

    /// Character that opens and closes a quoted identifier
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Quote an identifier, doubling any embedded quote character.
    ///
    /// Dotted names (`table.column`) are quoted per part.
    fn quote_identifier(&self, ident: &str) -> String {
        let q = self.identifier_quote();
        let doubled: String = [q, q].iter().collect();
        ident
            .split('.')
            .map(|part| format!("{q}{}{q}", part.replace(q, &doubled)))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Wrap a placeholder so an RFC 3339 string parameter compares as a timestamp
    ///
    /// - SQLite: `?` (ISO-8601 text compares lexicographically)
    /// - PostgreSQL: `CAST($1 AS TIMESTAMPTZ)`
    /// - DuckDB: `CAST(? AS TIMESTAMPTZ)`
    /// - ClickHouse: `parseDateTime64BestEffort(?, 6)`
    fn timestamp_param(&self, placeholder: &str) -> String;

    /// Generate SQL for checking if an array column contains a parameter
    ///
    /// - SQLite: `EXISTS (SELECT 1 FROM json_each(col) WHERE value = ?)`
    /// - DuckDB: `array_contains(col, ?)`
    /// - PostgreSQL: `? = ANY(col)`
    /// - ClickHouse: `has(col, ?)`
    fn array_contains(&self, array_col: &str, placeholder: &str) -> String;

    /// Escape clause appended to LIKE so backslash escapes `%` and `_`
    ///
    /// ClickHouse treats backslash as the escape character already and does
    /// not accept an ESCAPE clause.
    fn like_escape(&self) -> &'static str {
        " ESCAPE '\\'"
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ClickhouseDialect, PostgresDialect};
    use super::*;

    #[test]
    fn test_quote_identifier_doubles_quotes() {
        assert_eq!(PostgresDialect.quote_identifier("createdAt"), "\"createdAt\"");
        assert_eq!(
            PostgresDialect.quote_identifier("weird\"name"),
            "\"weird\"\"name\""
        );
        assert_eq!(
            PostgresDialect.quote_identifier("profiles.createdAt"),
            "\"profiles\".\"createdAt\""
        );
    }

    #[test]
    fn test_quote_identifier_clickhouse_backticks() {
        assert_eq!(ClickhouseDialect.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_like_escape() {
        assert_eq!(PostgresDialect.like_escape(), " ESCAPE '\\'");
        assert_eq!(ClickhouseDialect.like_escape(), "");
    }
}
