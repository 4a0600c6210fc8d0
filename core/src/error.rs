//! Error types for segment registration, ingestion and resolution
//!
//! Resolution is all-or-nothing: every [`ResolveError`] aborts the enclosing
//! `resolve` call and no partial query is returned.

use thiserror::Error;

/// Error raised while reducing a segment tree into a backend query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A leaf references a definition key absent from the registry and no
    /// fallback handler is configured
    #[error("Segment definition not found: {key}")]
    DefinitionNotFound { key: String },

    /// A composed segment has no children
    #[error("Composed segment at depth {depth} has no child segments")]
    EmptyComposite { depth: usize },

    /// A composed segment carries an operator other than AND/OR/NOT
    #[error("Unknown composition operator '{operator}' at depth {depth}")]
    UnknownOperator { operator: String, depth: usize },

    /// The tree uses a leaf variant whose composer callback is not provided
    #[error("Composer does not implement {callback}")]
    MissingComposerCallback { callback: &'static str },

    /// The tree nests deeper than the resolver allows
    #[error("Segment tree exceeds maximum depth of {limit}")]
    DepthLimitExceeded { limit: usize },

    /// A non-zero time offset is missing its unit or direction
    #[error("Time offset on field '{field}' has value {value} but no {missing}")]
    IncompleteTimeOffset {
        field: String,
        value: i64,
        missing: &'static str,
    },

    /// Shifting the reference date left the representable range
    #[error("Time offset on field '{field}' overflows the supported date range")]
    TimeOverflow { field: String },
}

impl ResolveError {
    pub fn definition_not_found(key: impl Into<String>) -> Self {
        Self::DefinitionNotFound { key: key.into() }
    }

    pub fn missing_callback(callback: &'static str) -> Self {
        Self::MissingComposerCallback { callback }
    }

    /// Resolution is deterministic over its inputs, so a retry without
    /// changing the tree, registry or composer reproduces the same failure.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Stable machine-readable code, matching the ingestion error codes
    pub fn code(&self) -> &'static str {
        match self {
            Self::DefinitionNotFound { .. } => "DEFINITION_NOT_FOUND",
            Self::EmptyComposite { .. } => "EMPTY_COMPOSITE",
            Self::UnknownOperator { .. } => "UNKNOWN_OPERATOR",
            Self::MissingComposerCallback { .. } => "MISSING_COMPOSER_CALLBACK",
            Self::DepthLimitExceeded { .. } => "DEPTH_LIMIT_EXCEEDED",
            Self::IncompleteTimeOffset { .. } => "INCOMPLETE_TIME_OFFSET",
            Self::TimeOverflow { .. } => "TIME_OVERFLOW",
        }
    }
}

/// Error raised while building a definition registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registration rejects a second definition with the same name
    #[error("Segment definition '{name}' is already registered")]
    DuplicateDefinition { name: String },

    /// Definition names must be non-empty
    #[error("Segment definition name must not be empty")]
    EmptyName,
}

/// Error raised while ingesting a segment tree from untrusted JSON
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Segment tree JSON exceeds maximum size of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Invalid segment tree JSON: {0}")]
    InvalidJson(String),

    #[error("Segment tree exceeds maximum depth of {limit}")]
    TooDeep { limit: usize },

    #[error("Segment tree exceeds maximum of {limit} segments")]
    TooManySegments { limit: usize },

    #[error("Composed segment at depth {depth} has no child segments")]
    EmptyComposite { depth: usize },

    #[error("Unknown composition operator '{operator}'")]
    UnknownOperator { operator: String },

    #[error("Segment definition '{key}' is not allowed")]
    DefinitionNotAllowed { key: String },

    #[error("Cannot filter by time field: {field}")]
    FieldNotAllowed { field: String },
}

impl ParseError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "TREE_JSON_TOO_LARGE",
            Self::InvalidJson(_) => "INVALID_TREE_JSON",
            Self::TooDeep { .. } => "TREE_TOO_DEEP",
            Self::TooManySegments { .. } => "TOO_MANY_SEGMENTS",
            Self::EmptyComposite { .. } => "EMPTY_COMPOSITE",
            Self::UnknownOperator { .. } => "UNKNOWN_OPERATOR",
            Self::DefinitionNotAllowed { .. } => "INVALID_DEFINITION_KEY",
            Self::FieldNotAllowed { .. } => "INVALID_TIME_FIELD",
        }
    }
}
