use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use std::path::PathBuf;

use segcompose::ReferenceDate;

use super::config::QueryBackend;
use super::constants::{APP_NAME_LOWER, ENV_BACKEND, ENV_CONFIG, ENV_MAX_DEPTH};

#[derive(Parser)]
#[command(name = APP_NAME_LOWER)]
#[command(version, about = "Compose named segments and resolve them into backend queries", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Query backend (mongo, memory, sqlite, postgres, duckdb or clickhouse)
    #[arg(long, short = 'b', global = true, env = ENV_BACKEND, value_parser = parse_query_backend)]
    pub backend: Option<QueryBackend>,

    /// Maximum nesting of composed segments
    #[arg(long, global = true, env = ENV_MAX_DEPTH)]
    pub max_depth: Option<usize>,
}

/// Parse query backend from CLI/env string
fn parse_query_backend(s: &str) -> Result<QueryBackend, String> {
    match s.to_lowercase().as_str() {
        "mongo" | "mongodb" => Ok(QueryBackend::Mongo),
        "memory" => Ok(QueryBackend::Memory),
        "sqlite" => Ok(QueryBackend::Sqlite),
        "postgres" | "postgresql" => Ok(QueryBackend::Postgres),
        "duckdb" => Ok(QueryBackend::Duckdb),
        "clickhouse" => Ok(QueryBackend::Clickhouse),
        _ => Err(format!(
            "Invalid backend '{}'. Valid options: mongo, memory, sqlite, postgres, duckdb, clickhouse",
            s
        )),
    }
}

/// Parse the `now` anchor: RFC 3339, a bare date, or `now`
fn parse_now(s: &str) -> Result<DateTime<Utc>, String> {
    match ReferenceDate::parse(s)? {
        ReferenceDate::Fixed(at) => Ok(at),
        ReferenceDate::Now => Ok(Utc::now()),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Resolve a segment tree into a backend query and print it as JSON
    Resolve {
        /// Tree JSON file, or `-` for stdin
        #[arg(long, short = 't')]
        tree: PathBuf,

        /// Instant used for "now" (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_now)]
        now: Option<DateTime<Utc>>,
    },
    /// Check a segment tree against the ingestion limits without resolving it
    Validate {
        /// Tree JSON file, or `-` for stdin
        #[arg(long, short = 't')]
        tree: PathBuf,
    },
    /// Print the configured definition catalog
    Definitions,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub backend: Option<QueryBackend>,
    pub max_depth: Option<usize>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        backend: cli.backend,
        max_depth: cli.max_depth,
    };
    (config, cli.command)
}
