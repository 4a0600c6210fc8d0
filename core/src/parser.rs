//! Segment tree ingestion
//!
//! Trees usually arrive as JSON from a front end. Parsing is bounded (input
//! size, nesting depth, node count) and the tree is checked structurally
//! before it ever reaches the resolver.

use rustc_hash::FxHashSet;

use crate::error::ParseError;
use crate::resolve::DEFAULT_MAX_DEPTH;
use crate::types::{ComposedSegment, CompositionOperator, Segment};

/// Maximum size of tree JSON in bytes (64KB)
pub const MAX_TREE_JSON_SIZE: usize = 64 * 1024;

/// Maximum number of segments in one tree
pub const MAX_SEGMENTS: usize = 500;

/// Bounds applied to incoming trees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLimits {
    pub max_json_bytes: usize,
    pub max_depth: usize,
    pub max_segments: usize,
    /// When set, only these definition keys may appear in leaves
    pub allowed_definitions: Option<FxHashSet<String>>,
    /// When set, time segments may only target these fields
    pub allowed_time_fields: Option<FxHashSet<String>>,
}

impl Default for TreeLimits {
    fn default() -> Self {
        Self {
            max_json_bytes: MAX_TREE_JSON_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            max_segments: MAX_SEGMENTS,
            allowed_definitions: None,
            allowed_time_fields: None,
        }
    }
}

impl TreeLimits {
    pub fn with_allowed_definitions<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_definitions = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_allowed_time_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_time_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    fn check_definition(&self, key: &str) -> Result<(), ParseError> {
        match &self.allowed_definitions {
            Some(allowed) if !allowed.contains(key) => Err(ParseError::DefinitionNotAllowed {
                key: key.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn check_time_field(&self, field: &str) -> Result<(), ParseError> {
        match &self.allowed_time_fields {
            Some(allowed) if !allowed.contains(field) => Err(ParseError::FieldNotAllowed {
                field: field.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Parse a segment tree from JSON
///
/// Validates JSON size, parses the root composed segment (its `"type"` tag is
/// optional), then runs [`validate_tree`].
pub fn parse_segment_tree(
    json_str: &str,
    limits: &TreeLimits,
) -> Result<ComposedSegment, ParseError> {
    if json_str.len() > limits.max_json_bytes {
        return Err(ParseError::TooLarge {
            limit: limits.max_json_bytes,
        });
    }

    let tree: ComposedSegment =
        serde_json::from_str(json_str).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    validate_tree(&tree, limits)?;
    tracing::debug!(
        bytes = json_str.len(),
        segments = tree.segment_count(),
        "Parsed segment tree"
    );
    Ok(tree)
}

/// Structural checks on an in-memory tree
///
/// Rejects unknown operators, empty composites, trees deeper than
/// `max_depth` or larger than `max_segments`, and leaves outside the
/// configured whitelists.
pub fn validate_tree(tree: &ComposedSegment, limits: &TreeLimits) -> Result<(), ParseError> {
    let mut seen = 0usize;
    let mut stack = vec![(tree, 1usize)];

    while let Some((node, depth)) = stack.pop() {
        if depth > limits.max_depth {
            return Err(ParseError::TooDeep {
                limit: limits.max_depth,
            });
        }
        if let CompositionOperator::Other(op) = &node.operator {
            return Err(ParseError::UnknownOperator {
                operator: op.clone(),
            });
        }
        if node.segments.is_empty() {
            return Err(ParseError::EmptyComposite { depth });
        }

        seen += node.segments.len();
        if seen > limits.max_segments {
            return Err(ParseError::TooManySegments {
                limit: limits.max_segments,
            });
        }

        for segment in &node.segments {
            match segment {
                Segment::Composed(child) => stack.push((child, depth + 1)),
                Segment::Definition(leaf) => limits.check_definition(&leaf.definition_key)?,
                Segment::TimePeriod(period) => limits.check_time_field(&period.field)?,
                Segment::TimeRange(range) => limits.check_time_field(&range.field)?,
                Segment::FixedTimePeriod(fixed) => limits.check_time_field(&fixed.options.field)?,
            }
        }
    }

    Ok(())
}
