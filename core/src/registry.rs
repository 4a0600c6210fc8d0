//! Segment definition registry
//!
//! An ordered table mapping a unique name to a query builder. Built once at
//! setup time and read-only afterwards, so it can be shared across concurrent
//! resolutions without locking.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, ResolveError};
use crate::types::SegmentValue;

/// Builder turning a runtime value into a backend query
pub type BuildQuery<Q> = dyn Fn(&SegmentValue) -> Q + Send + Sync;

/// A named, reusable segment
pub struct SegmentDefinition<Q> {
    name: String,
    description: Option<String>,
    build_query: Box<BuildQuery<Q>>,
}

impl<Q> SegmentDefinition<Q> {
    pub fn new<F>(name: impl Into<String>, build_query: F) -> Self
    where
        F: Fn(&SegmentValue) -> Q + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            build_query: Box::new(build_query),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Build the query this segment represents for `value`
    pub fn build_query(&self, value: &SegmentValue) -> Q {
        (self.build_query)(value)
    }

    pub fn info(&self) -> DefinitionInfo {
        DefinitionInfo {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

impl<Q> fmt::Debug for SegmentDefinition<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Serializable description of a definition, for sharing with front ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Lookup interface consumed by the resolver
pub trait DefinitionLookup<Q> {
    fn find(&self, name: &str) -> Option<&SegmentDefinition<Q>>;
}

/// Plain slices are searched linearly
impl<Q> DefinitionLookup<Q> for [SegmentDefinition<Q>] {
    fn find(&self, name: &str) -> Option<&SegmentDefinition<Q>> {
        self.iter().find(|d| d.name == name)
    }
}

/// Ordered registry with unique names
///
/// Registering a name twice is rejected with
/// [`RegistryError::DuplicateDefinition`]; the first definition is kept.
pub struct SegmentDefinitions<Q> {
    definitions: Vec<SegmentDefinition<Q>>,
    index: FxHashMap<String, usize>,
}

impl<Q> SegmentDefinitions<Q> {
    pub fn new() -> Self {
        Self {
            definitions: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Build a registry from `definitions`, failing on the first duplicate
    pub fn from_definitions<I>(definitions: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = SegmentDefinition<Q>>,
    {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, definition: SegmentDefinition<Q>) -> Result<(), RegistryError> {
        if definition.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.index.contains_key(&definition.name) {
            tracing::debug!(name = %definition.name, "Rejected duplicate segment definition");
            return Err(RegistryError::DuplicateDefinition {
                name: definition.name,
            });
        }
        tracing::trace!(name = %definition.name, "Registered segment definition");
        self.index
            .insert(definition.name.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &SegmentDefinition<Q>> {
        self.definitions.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    /// Look up `name` and build its query for `value`
    pub fn build(&self, name: &str, value: &SegmentValue) -> Result<Q, ResolveError> {
        self.find(name)
            .map(|d| d.build_query(value))
            .ok_or_else(|| ResolveError::definition_not_found(name))
    }

    /// Names and descriptions in registration order
    pub fn catalog(&self) -> Vec<DefinitionInfo> {
        self.definitions.iter().map(SegmentDefinition::info).collect()
    }
}

impl<Q> Default for SegmentDefinitions<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> DefinitionLookup<Q> for SegmentDefinitions<Q> {
    fn find(&self, name: &str) -> Option<&SegmentDefinition<Q>> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }
}

impl<Q> fmt::Debug for SegmentDefinitions<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.definitions.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn growth_definitions() -> SegmentDefinitions<Value> {
        SegmentDefinitions::from_definitions([
            SegmentDefinition::new("originalSource", |v: &SegmentValue| {
                json!({ "originalSource": v.to_json() })
            })
            .with_description("Segment by originalSource of profiles."),
            SegmentDefinition::new("customerOrProspect", |v: &SegmentValue| {
                if v.as_str() == Some("customer") {
                    json!({ "totalTransactions": { "$gt": 0 } })
                } else {
                    json!({ "totalTransactions": { "$eq": 0 } })
                }
            }),
        ])
        .unwrap()
    }

    #[test]
    fn test_find_returns_registered_builder() {
        let registry = growth_definitions();
        let def = registry.find("originalSource").unwrap();
        assert_eq!(def.name(), "originalSource");
        assert_eq!(
            def.build_query(&SegmentValue::from("Google")),
            json!({ "originalSource": "Google" })
        );
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut registry = growth_definitions();
        let err = registry
            .register(SegmentDefinition::new("originalSource", |_| json!({})))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateDefinition {
                name: "originalSource".to_string()
            }
        );
        // First registration wins
        assert_eq!(
            registry.build("originalSource", &SegmentValue::from("A")).unwrap(),
            json!({ "originalSource": "A" })
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut registry: SegmentDefinitions<Value> = SegmentDefinitions::new();
        assert_eq!(
            registry.register(SegmentDefinition::new("", |_| json!({}))),
            Err(RegistryError::EmptyName)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_build_missing_definition_fails() {
        let registry = growth_definitions();
        assert_eq!(
            registry
                .build("nope", &SegmentValue::Null)
                .unwrap_err(),
            ResolveError::definition_not_found("nope")
        );
    }

    #[test]
    fn test_catalog_preserves_registration_order() {
        let registry = growth_definitions();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["originalSource", "customerOrProspect"]
        );
        assert_eq!(
            serde_json::to_value(registry.catalog()).unwrap(),
            json!([
                { "name": "originalSource", "description": "Segment by originalSource of profiles." },
                { "name": "customerOrProspect" }
            ])
        );
    }

    #[test]
    fn test_slices_support_lookup() {
        let defs = vec![SegmentDefinition::new("a", |_: &SegmentValue| 1)];
        assert_eq!(defs.as_slice().find("a").map(|d| d.name()), Some("a"));
        assert!(defs.as_slice().find("b").is_none());
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SegmentDefinitions<Value>>();
    }
}
