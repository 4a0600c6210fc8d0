//! SQL predicates for multi-database support
//!
//! [`SqlComposer`] builds dialect-aware `WHERE` predicates with every value
//! bound as a parameter. Predicates carry neutral `?` markers until
//! [`SqlPredicate::render`] numbers them for the target dialect.

mod clickhouse_dialect;
mod composer;
mod dialect;
mod duckdb_dialect;
mod postgres_dialect;
mod predicate;
mod sqlite_dialect;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use clickhouse_dialect::ClickhouseDialect;
pub use composer::{SqlComposer, escape_like_pattern};
pub use dialect::SqlDialect;
pub use duckdb_dialect::DuckdbDialect;
pub use postgres_dialect::PostgresDialect;
pub use predicate::{RenderedSql, SqlPredicate, SqlValue};
pub use sqlite_dialect::SqliteDialect;

/// Database backend identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlBackend {
    Sqlite,
    Postgres,
    Duckdb,
    Clickhouse,
}

impl SqlBackend {
    /// Get the SQL dialect for this backend
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            SqlBackend::Sqlite => &SqliteDialect,
            SqlBackend::Postgres => &PostgresDialect,
            SqlBackend::Duckdb => &DuckdbDialect,
            SqlBackend::Clickhouse => &ClickhouseDialect,
        }
    }

    /// Get the backend name
    pub fn name(&self) -> &'static str {
        self.dialect().name()
    }
}

impl FromStr for SqlBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SqlBackend::Sqlite),
            "postgres" | "postgresql" => Ok(SqlBackend::Postgres),
            "duckdb" => Ok(SqlBackend::Duckdb),
            "clickhouse" => Ok(SqlBackend::Clickhouse),
            _ => Err(format!("Unknown SQL backend: {}", s)),
        }
    }
}

impl std::fmt::Display for SqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
