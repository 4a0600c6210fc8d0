//! Declarative segment definitions
//!
//! Definitions usually live in code as closures, but simple ones ("field
//! equals the value", "field greater than zero when the value is `customer`")
//! can be described as data and shared with front ends or loaded from a config
//! file. A [`DefinitionRule`] is turned into a registry entry for any composer
//! implementing [`FieldComposer`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::composer::QueryComposer;
use crate::error::RegistryError;
use crate::registry::{SegmentDefinition, SegmentDefinitions};
use crate::types::SegmentValue;

/// Comparison between a record field and a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldComparison {
    #[default]
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring match on strings, membership on arrays
    Contains,
}

impl FieldComparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
        }
    }
}

/// Composer that can express a plain field comparison
pub trait FieldComposer: QueryComposer {
    fn compose_field_query(
        &self,
        field: &str,
        comparison: FieldComparison,
        value: &SegmentValue,
    ) -> Self::Query;

    /// Query matching every record
    fn match_all(&self) -> Self::Query;

    /// Query matching no record
    fn match_none(&self) -> Self::Query;
}

/// Replacement applied when a leaf carries a particular value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMapping {
    /// Overrides the rule's comparison for this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<FieldComparison>,
    pub value: SegmentValue,
}

/// Data form of a segment definition
///
/// The leaf value is compared with `field` using `comparison`. When `values`
/// has an entry for the leaf value (keyed by its string form), that entry's
/// value and comparison are used instead; unmapped values pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub field: String,
    #[serde(default)]
    pub comparison: FieldComparison,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, ValueMapping>,
}

impl DefinitionRule {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            field: field.into(),
            comparison: FieldComparison::Eq,
            values: BTreeMap::new(),
        }
    }

    pub fn with_comparison(mut self, comparison: FieldComparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Map the incoming token `when` onto `value` compared with `comparison`
    pub fn map_value(
        mut self,
        when: impl Into<String>,
        comparison: FieldComparison,
        value: impl Into<SegmentValue>,
    ) -> Self {
        self.values.insert(
            when.into(),
            ValueMapping {
                comparison: Some(comparison),
                value: value.into(),
            },
        );
        self
    }

    /// Comparison and value to apply for an incoming leaf value
    pub fn effective(&self, value: &SegmentValue) -> (FieldComparison, SegmentValue) {
        match self.values.get(&value.to_string()) {
            Some(mapping) => (
                mapping.comparison.unwrap_or(self.comparison),
                mapping.value.clone(),
            ),
            None => (self.comparison, value.clone()),
        }
    }

    /// Registry entry building this rule's query with `composer`
    pub fn to_definition<C>(&self, composer: &C) -> SegmentDefinition<C::Query>
    where
        C: FieldComposer + Clone + Send + Sync + 'static,
    {
        let rule = self.clone();
        let composer = composer.clone();
        let definition = SegmentDefinition::new(self.name.clone(), move |value: &SegmentValue| {
            let (comparison, value) = rule.effective(value);
            composer.compose_field_query(&rule.field, comparison, &value)
        });
        match &self.description {
            Some(description) => definition.with_description(description.clone()),
            None => definition,
        }
    }
}

/// Build a registry from `rules`, in order, rejecting duplicate names
pub fn build_registry<C>(
    rules: &[DefinitionRule],
    composer: &C,
) -> Result<SegmentDefinitions<C::Query>, RegistryError>
where
    C: FieldComposer + Clone + Send + Sync + 'static,
{
    tracing::debug!(rules = rules.len(), "Building registry from definition rules");
    SegmentDefinitions::from_definitions(rules.iter().map(|rule| rule.to_definition(composer)))
}
