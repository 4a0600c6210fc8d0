//! Ready-made composers
//!
//! - [`mongo`]: MongoDB-style JSON filter documents
//! - [`sql`]: parameterized SQL predicates for SQLite, PostgreSQL, DuckDB and ClickHouse
//! - [`memory`]: predicate trees evaluated directly against JSON records

pub mod memory;
pub mod mongo;
pub mod sql;

pub use memory::{MemoryComposer, Predicate};
pub use mongo::MongoComposer;
pub use sql::{RenderedSql, SqlBackend, SqlComposer, SqlDialect, SqlPredicate, SqlValue};
