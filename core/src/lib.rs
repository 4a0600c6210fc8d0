//! Segment composition
//!
//! Applications describe reusable filters ("segments") once, compose them
//! into AND/OR/NOT trees, and resolve a tree into a single backend-native
//! query. The library never builds backend queries itself: a
//! [`QueryComposer`] supplies every primitive.
//!
//! ```
//! use segcompose::backends::MongoComposer;
//! use segcompose::builder::and;
//! use segcompose::{Segment, SegmentDefinition, SegmentDefinitions, SegmentValue, resolve};
//! use serde_json::json;
//!
//! let registry = SegmentDefinitions::from_definitions([SegmentDefinition::new(
//!     "originalSource",
//!     |v: &SegmentValue| json!({ "originalSource": v.to_json() }),
//! )])
//! .unwrap();
//!
//! let tree = and([
//!     Segment::definition("originalSource", "Google"),
//!     Segment::definition("originalSource", "Facebook").negated(),
//! ]);
//!
//! let query = resolve(&tree, &registry, &MongoComposer).unwrap();
//! assert_eq!(
//!     query,
//!     json!({ "$and": [
//!         { "originalSource": "Google" },
//!         { "originalSource": { "$ne": "Facebook" } }
//!     ] })
//! );
//! ```

pub mod backends;
pub mod builder;
pub mod composer;
pub mod error;
pub mod parser;
pub mod registry;
pub mod resolve;
pub mod rules;
pub mod time;
pub mod types;

pub use composer::QueryComposer;
pub use error::{ParseError, RegistryError, ResolveError};
pub use parser::{TreeLimits, parse_segment_tree, validate_tree};
pub use registry::{DefinitionInfo, DefinitionLookup, SegmentDefinition, SegmentDefinitions};
pub use resolve::{AndReduction, DEFAULT_MAX_DEPTH, MissingDefinitionPolicy, Resolver, resolve};
pub use rules::{DefinitionRule, FieldComparison, FieldComposer, build_registry};
pub use time::{Direction, ReferenceDate, TimeOffset, TimePeriodOperator, TimeUnit};
pub use types::{
    ComposedSegment, CompositionOperator, FixedTimePeriodSegment, LeafSegment, Segment,
    SegmentValue, TimePeriodSegment, TimeRangeSegment,
};
