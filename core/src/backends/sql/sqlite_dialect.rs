//! SQLite SQL dialect implementation

use super::SqlDialect;

/// SQLite SQL dialect
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn timestamp_param(&self, placeholder: &str) -> String {
        // SQLite has no timestamp type, timestamps are stored as ISO-8601 text
        placeholder.to_string()
    }

    fn array_contains(&self, array_col: &str, placeholder: &str) -> String {
        // SQLite stores arrays as JSON text, use json_each to search
        format!(
            "EXISTS (SELECT 1 FROM json_each({}) WHERE value = {})",
            array_col, placeholder
        )
    }
}
