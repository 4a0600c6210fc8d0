//! Command implementations
//!
//! Each command returns the JSON document to print so it can be tested
//! without capturing stdout.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use segcompose::backends::{MemoryComposer, MongoComposer, SqlComposer};
use segcompose::{ComposedSegment, FieldComposer, Resolver, build_registry, parse_segment_tree};

use crate::core::config::{AppConfig, MissingDefinition, QueryBackend};

/// Parse `tree_json` and resolve it with the configured backend
pub fn resolve_tree(
    config: &AppConfig,
    tree_json: &str,
    now: Option<DateTime<Utc>>,
) -> Result<Value> {
    let tree = parse(config, tree_json)?;

    let query = match (config.backend, config.backend.sql_backend()) {
        (_, Some(sql)) => {
            let composer = SqlComposer::new(sql);
            let predicate = resolve_with(config, &tree, &composer, now)?;
            serde_json::to_value(composer.render(&predicate))?
        }
        (QueryBackend::Memory, None) => {
            serde_json::to_value(resolve_with(config, &tree, &MemoryComposer, now)?)?
        }
        (_, None) => resolve_with(config, &tree, &MongoComposer, now)?,
    };

    tracing::debug!(backend = %config.backend, "Resolved segment tree");
    Ok(query)
}

/// Parse `tree_json` and report its shape without resolving it
pub fn validate_tree(config: &AppConfig, tree_json: &str) -> Result<Value> {
    let tree = parse(config, tree_json)?;
    Ok(json!({
        "valid": true,
        "operator": tree.operator.as_str(),
        "depth": tree.depth(),
        "segments": tree.segment_count(),
    }))
}

/// Configured definition rules, in order
pub fn definitions(config: &AppConfig) -> Result<Value> {
    Ok(serde_json::to_value(&config.definitions)?)
}

fn parse(config: &AppConfig, tree_json: &str) -> Result<ComposedSegment> {
    parse_segment_tree(tree_json, &config.tree_limits())
        .map_err(|e| anyhow!("{} [{}]", e, e.code()))
}

fn resolve_with<C>(
    config: &AppConfig,
    tree: &ComposedSegment,
    composer: &C,
    now: Option<DateTime<Utc>>,
) -> Result<C::Query>
where
    C: FieldComposer + Clone + Send + Sync + 'static,
{
    let registry = build_registry(&config.definitions, composer)?;

    let mut resolver = Resolver::new().with_max_depth(config.resolver.max_depth);
    if let Some(now) = now {
        resolver = resolver.with_now(now);
    }
    let fallback = composer.clone();
    resolver = match config.resolver.missing_definition {
        MissingDefinition::Fail => resolver,
        MissingDefinition::MatchNone => resolver.with_fallback(move |_| fallback.match_none()),
        MissingDefinition::MatchAll => resolver.with_fallback(move |_| fallback.match_all()),
    };

    resolver
        .resolve(tree, &registry, composer)
        .map_err(|e| anyhow!("{} [{}]", e, e.code()))
}
