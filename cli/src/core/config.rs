use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use segcompose::DefinitionRule;
use segcompose::backends::SqlBackend;
use segcompose::parser::{MAX_SEGMENTS, MAX_TREE_JSON_SIZE, TreeLimits};
use segcompose::resolve::DEFAULT_MAX_DEPTH;

use super::cli::CliConfig;
use super::constants::{APP_DOT_FOLDER, CONFIG_FILE_NAME};
use crate::utils::file::expand_path;

/// Target query language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryBackend {
    /// MongoDB filter documents
    #[default]
    Mongo,
    /// In-memory predicate tree
    Memory,
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
    Duckdb,
    Clickhouse,
}

impl QueryBackend {
    /// SQL backend when this target is a SQL database
    pub fn sql_backend(&self) -> Option<SqlBackend> {
        match self {
            QueryBackend::Mongo | QueryBackend::Memory => None,
            QueryBackend::Sqlite => Some(SqlBackend::Sqlite),
            QueryBackend::Postgres => Some(SqlBackend::Postgres),
            QueryBackend::Duckdb => Some(SqlBackend::Duckdb),
            QueryBackend::Clickhouse => Some(SqlBackend::Clickhouse),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QueryBackend::Mongo => "mongo",
            QueryBackend::Memory => "memory",
            QueryBackend::Sqlite => "sqlite",
            QueryBackend::Postgres => "postgres",
            QueryBackend::Duckdb => "duckdb",
            QueryBackend::Clickhouse => "clickhouse",
        }
    }
}

impl fmt::Display for QueryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Handling of leaves whose definition is not configured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDefinition {
    /// Reject the tree
    #[default]
    Fail,
    /// Substitute a query matching nothing
    MatchNone,
    /// Substitute a query matching everything
    MatchAll,
}

/// Resolver configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ResolverFileConfig {
    pub max_depth: Option<usize>,
    pub missing_definition: Option<MissingDefinition>,
}

/// Ingestion limits section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LimitsFileConfig {
    pub max_json_bytes: Option<usize>,
    pub max_nodes: Option<usize>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub backend: Option<QueryBackend>,
    pub resolver: Option<ResolverFileConfig>,
    pub limits: Option<LimitsFileConfig>,
    pub definitions: Option<Vec<DefinitionRule>>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    ///
    /// A `definitions` list replaces the current one as a whole.
    fn merge(&mut self, other: FileConfig) {
        if other.backend.is_some() {
            tracing::trace!(backend = ?other.backend, "Merging backend");
            self.backend = other.backend;
        }

        if let Some(resolver) = other.resolver {
            let current = self.resolver.get_or_insert_with(ResolverFileConfig::default);
            if resolver.max_depth.is_some() {
                tracing::trace!(max_depth = ?resolver.max_depth, "Merging resolver.max_depth");
                current.max_depth = resolver.max_depth;
            }
            if resolver.missing_definition.is_some() {
                tracing::trace!(
                    missing_definition = ?resolver.missing_definition,
                    "Merging resolver.missing_definition"
                );
                current.missing_definition = resolver.missing_definition;
            }
        }

        if let Some(limits) = other.limits {
            let current = self.limits.get_or_insert_with(LimitsFileConfig::default);
            if limits.max_json_bytes.is_some() {
                tracing::trace!(
                    max_json_bytes = ?limits.max_json_bytes,
                    "Merging limits.max_json_bytes"
                );
                current.max_json_bytes = limits.max_json_bytes;
            }
            if limits.max_nodes.is_some() {
                tracing::trace!(max_nodes = ?limits.max_nodes, "Merging limits.max_nodes");
                current.max_nodes = limits.max_nodes;
            }
        }

        if let Some(definitions) = other.definitions {
            tracing::trace!(count = definitions.len(), "Merging definitions");
            self.definitions = Some(definitions);
        }
    }
}

/// Resolver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub max_depth: usize,
    pub missing_definition: MissingDefinition,
}

/// Tree ingestion limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitsConfig {
    pub max_json_bytes: usize,
    pub max_nodes: usize,
}

/// Effective application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: QueryBackend,
    pub resolver: ResolverConfig,
    pub limits: LimitsConfig,
    pub definitions: Vec<DefinitionRule>,
}

impl AppConfig {
    /// Load configuration with layered precedence:
    /// 1. Built-in defaults
    /// 2. Profile directory config (~/.segcompose/segcompose.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(cli, file_config);
        config.validate()?;

        tracing::debug!(
            backend = %config.backend,
            max_depth = config.resolver.max_depth,
            definitions = config.definitions.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn from_layers(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_resolver = file_config.resolver.unwrap_or_default();
        let file_limits = file_config.limits.unwrap_or_default();

        let backend = cli.backend.or(file_config.backend).unwrap_or_default();

        let resolver = ResolverConfig {
            max_depth: cli
                .max_depth
                .or(file_resolver.max_depth)
                .unwrap_or(DEFAULT_MAX_DEPTH),
            missing_definition: file_resolver.missing_definition.unwrap_or_default(),
        };

        let limits = LimitsConfig {
            max_json_bytes: file_limits.max_json_bytes.unwrap_or(MAX_TREE_JSON_SIZE),
            max_nodes: file_limits.max_nodes.unwrap_or(MAX_SEGMENTS),
        };

        Self {
            backend,
            resolver,
            limits,
            definitions: file_config.definitions.unwrap_or_default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.resolver.max_depth == 0 {
            anyhow::bail!("Configuration error: resolver.max_depth must be greater than 0");
        }
        if self.limits.max_json_bytes == 0 {
            anyhow::bail!("Configuration error: limits.max_json_bytes must be greater than 0");
        }
        if self.limits.max_nodes == 0 {
            anyhow::bail!("Configuration error: limits.max_nodes must be greater than 0");
        }

        let mut names = HashSet::new();
        for rule in &self.definitions {
            if rule.name.is_empty() {
                anyhow::bail!("Configuration error: definitions[].name must not be empty");
            }
            if !names.insert(rule.name.as_str()) {
                anyhow::bail!(
                    "Configuration error: duplicate definition name '{}'",
                    rule.name
                );
            }
        }

        Ok(())
    }

    /// Ingestion limits for incoming trees.
    ///
    /// With the `fail` policy and a non-empty catalog, unknown definition keys
    /// are rejected while parsing.
    pub fn tree_limits(&self) -> TreeLimits {
        let limits = TreeLimits {
            max_json_bytes: self.limits.max_json_bytes,
            max_depth: self.resolver.max_depth,
            max_segments: self.limits.max_nodes,
            ..TreeLimits::default()
        };
        if self.resolver.missing_definition == MissingDefinition::Fail
            && !self.definitions.is_empty()
        {
            return limits.with_allowed_definitions(self.definitions.iter().map(|r| r.name.clone()));
        }
        limits
    }
}

/// Get the profile config path (~/.segcompose/segcompose.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
