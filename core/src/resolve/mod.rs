//! Resolution engine
//!
//! Reduces a segment tree into one backend query, depth-first and post-order:
//! every child of a composed segment is resolved (recursing into nested
//! composites) before the operator's combinator folds the ordered results.
//!
//! | operator | combinator |
//! |---|---|
//! | AND | [`QueryComposer::compose_and_query`] (or [`QueryComposer::combine_queries`] with [`AndReduction::Combine`]) |
//! | OR | [`QueryComposer::compose_or_query`] |
//! | NOT | [`QueryComposer::compose_not_query`] |
//!
//! Resolution is pure: the tree and registry are only read, and any error
//! aborts the whole call without a partial result.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::composer::QueryComposer;
use crate::error::ResolveError;
use crate::registry::DefinitionLookup;
use crate::time::Direction;
use crate::types::{
    ComposedSegment, CompositionOperator, FixedTimePeriodSegment, LeafSegment, Segment,
    TimePeriodSegment, TimeRangeSegment,
};

#[cfg(test)]
mod tests;

/// Default nesting limit for composed segments
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Handler producing a substitute query for a leaf with no definition
pub type FallbackHandler<Q> = dyn Fn(&LeafSegment) -> Q + Send + Sync;

/// What to do with a leaf whose definition key is not registered
pub enum MissingDefinitionPolicy<Q> {
    /// Abort resolution with [`ResolveError::DefinitionNotFound`]
    Fail,
    /// Substitute the handler's query for the leaf
    Fallback(Box<FallbackHandler<Q>>),
}

impl<Q> fmt::Debug for MissingDefinitionPolicy<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "Fail"),
            Self::Fallback(_) => write!(f, "Fallback(..)"),
        }
    }
}

/// How AND nodes are reduced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AndReduction {
    /// Explicit conjunction via `compose_and_query`
    #[default]
    Conjunction,
    /// Structural merge via `combine_queries`
    Combine,
}

/// Configured resolution engine
///
/// Options are fixed for every call made through one resolver, so a tree is
/// never resolved with a mix of missing-definition policies.
#[derive(Debug)]
pub struct Resolver<Q> {
    max_depth: usize,
    missing_definition: MissingDefinitionPolicy<Q>,
    and_reduction: AndReduction,
    now: Option<DateTime<Utc>>,
}

impl<Q> Default for Resolver<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> Resolver<Q> {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            missing_definition: MissingDefinitionPolicy::Fail,
            and_reduction: AndReduction::Conjunction,
            now: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Substitute `handler`'s query for leaves with no registered definition
    pub fn with_fallback<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LeafSegment) -> Q + Send + Sync + 'static,
    {
        self.missing_definition = MissingDefinitionPolicy::Fallback(Box::new(handler));
        self
    }

    pub fn with_missing_definition(mut self, policy: MissingDefinitionPolicy<Q>) -> Self {
        self.missing_definition = policy;
        self
    }

    pub fn with_and_reduction(mut self, and_reduction: AndReduction) -> Self {
        self.and_reduction = and_reduction;
        self
    }

    /// Pin the instant used for `"now"` instead of reading the wall clock
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve `tree` into a single backend query.
    ///
    /// `"now"` is read once per call, so every relative segment in the tree
    /// shares the same anchor.
    pub fn resolve<C, R>(
        &self,
        tree: &ComposedSegment,
        registry: &R,
        composer: &C,
    ) -> Result<Q, ResolveError>
    where
        C: QueryComposer<Query = Q> + ?Sized,
        R: DefinitionLookup<Q> + ?Sized,
    {
        let now = self.now.unwrap_or_else(Utc::now);
        tracing::debug!(
            operator = %tree.operator,
            segments = tree.segments.len(),
            max_depth = self.max_depth,
            "Resolving segment tree"
        );

        let pass = Pass {
            resolver: self,
            registry,
            composer,
            now,
        };
        let result = pass.reduce(tree, 1);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "Segment tree resolution failed");
        }
        result
    }
}

/// Resolve `tree` with default options: missing definitions fail, depth is
/// capped at [`DEFAULT_MAX_DEPTH`], AND uses explicit conjunction
pub fn resolve<Q, C, R>(
    tree: &ComposedSegment,
    registry: &R,
    composer: &C,
) -> Result<Q, ResolveError>
where
    C: QueryComposer<Query = Q> + ?Sized,
    R: DefinitionLookup<Q> + ?Sized,
{
    Resolver::new().resolve(tree, registry, composer)
}

#[derive(Clone, Copy)]
enum Reduce {
    And,
    Or,
    Not,
}

/// State of one `resolve` call
struct Pass<'a, Q, C: ?Sized, R: ?Sized> {
    resolver: &'a Resolver<Q>,
    registry: &'a R,
    composer: &'a C,
    now: DateTime<Utc>,
}

impl<Q, C, R> Pass<'_, Q, C, R>
where
    C: QueryComposer<Query = Q> + ?Sized,
    R: DefinitionLookup<Q> + ?Sized,
{
    fn reduce(&self, node: &ComposedSegment, depth: usize) -> Result<Q, ResolveError> {
        if depth > self.resolver.max_depth {
            return Err(ResolveError::DepthLimitExceeded {
                limit: self.resolver.max_depth,
            });
        }
        let operator = match &node.operator {
            CompositionOperator::And => Reduce::And,
            CompositionOperator::Or => Reduce::Or,
            CompositionOperator::Not => Reduce::Not,
            CompositionOperator::Other(op) => {
                return Err(ResolveError::UnknownOperator {
                    operator: op.clone(),
                    depth,
                });
            }
        };
        if node.segments.is_empty() {
            return Err(ResolveError::EmptyComposite { depth });
        }

        let mut queries = Vec::with_capacity(node.segments.len());
        for segment in &node.segments {
            queries.push(self.resolve_segment(segment, depth)?);
        }

        tracing::trace!(
            operator = %node.operator,
            depth,
            children = queries.len(),
            "Reducing composed segment"
        );

        match operator {
            Reduce::And => match self.resolver.and_reduction {
                AndReduction::Conjunction => Ok(self.composer.compose_and_query(queries)),
                AndReduction::Combine => self.composer.combine_queries(queries),
            },
            Reduce::Or => Ok(self.composer.compose_or_query(queries)),
            Reduce::Not => Ok(self.composer.compose_not_query(queries)),
        }
    }

    fn resolve_segment(&self, segment: &Segment, depth: usize) -> Result<Q, ResolveError> {
        match segment {
            Segment::Composed(child) => self.reduce(child, depth + 1),
            Segment::Definition(leaf) => self.resolve_definition(leaf),
            Segment::TimePeriod(period) => self.resolve_time_period(period),
            Segment::TimeRange(range) => self.resolve_time_range(range),
            Segment::FixedTimePeriod(fixed) => self.resolve_fixed_time_period(fixed),
        }
    }

    fn resolve_definition(&self, leaf: &LeafSegment) -> Result<Q, ResolveError> {
        let Some(definition) = self.registry.find(&leaf.definition_key) else {
            return match &self.resolver.missing_definition {
                MissingDefinitionPolicy::Fail => {
                    Err(ResolveError::definition_not_found(&leaf.definition_key))
                }
                MissingDefinitionPolicy::Fallback(handler) => {
                    tracing::debug!(
                        definition_key = %leaf.definition_key,
                        "Segment definition not found, using fallback"
                    );
                    Ok(handler(leaf))
                }
            };
        };

        // Negation replaces the definition's query rather than wrapping it
        if leaf.negate {
            return Ok(self
                .composer
                .negate_query(&leaf.definition_key, &leaf.value));
        }
        Ok(definition.build_query(&leaf.value))
    }

    fn resolve_time_period(&self, period: &TimePeriodSegment) -> Result<Q, ResolveError> {
        let instant = period.value.resolve(self.now);
        self.composer
            .compose_time_period_query(&period.field, instant, period.operator, period.negate)
    }

    fn resolve_time_range(&self, range: &TimeRangeSegment) -> Result<Q, ResolveError> {
        let reference = range.reference_date.resolve(self.now);
        let start = range.options.start.apply(reference, &range.field, None)?;
        let end = range.options.end.apply(reference, &range.field, None)?;
        tracing::trace!(field = %range.field, %start, %end, "Resolved time range");
        self.composer
            .compose_time_range_query(&range.field, start, end)
    }

    fn resolve_fixed_time_period(&self, fixed: &FixedTimePeriodSegment) -> Result<Q, ResolveError> {
        let reference = fixed.reference_date.resolve(self.now);
        let options = &fixed.options;
        let instant = options
            .offset()
            .apply(reference, &options.field, Some(Direction::Before))?;
        self.composer
            .compose_fixed_time_period_query(&options.field, instant, options.operator)
    }
}
