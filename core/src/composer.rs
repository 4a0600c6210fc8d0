//! Backend composer contract
//!
//! The resolver never builds backend queries itself. Every primitive intent is
//! handed to a [`QueryComposer`] which turns it into the backend's native
//! query representation.

use chrono::{DateTime, Utc};

use crate::error::ResolveError;
use crate::time::TimePeriodOperator;
use crate::types::SegmentValue;

/// Callbacks that turn resolved segment intents into backend queries
///
/// The boolean combinators and [`negate_query`](Self::negate_query) are
/// required. Time-based callbacks and [`combine_queries`](Self::combine_queries)
/// are optional: the defaults fail with
/// [`ResolveError::MissingComposerCallback`] the first time a tree needs them.
pub trait QueryComposer {
    /// Native query representation, opaque to the resolver
    type Query;

    /// Conjunction of `queries`, in order
    fn compose_and_query(&self, queries: Vec<Self::Query>) -> Self::Query;

    /// Disjunction of `queries`, in order
    fn compose_or_query(&self, queries: Vec<Self::Query>) -> Self::Query;

    /// Negation of the group `queries`.
    ///
    /// With more than one query this negates their conjunction.
    fn compose_not_query(&self, queries: Vec<Self::Query>) -> Self::Query;

    /// Negated form of a definitional leaf (`field` is the definition key)
    fn negate_query(&self, field: &str, value: &SegmentValue) -> Self::Query;

    /// Compare `field` against a single instant. The composer decides how
    /// `negate` maps onto the native operator.
    fn compose_time_period_query(
        &self,
        _field: &str,
        _value: DateTime<Utc>,
        _operator: TimePeriodOperator,
        _negate: bool,
    ) -> Result<Self::Query, ResolveError> {
        Err(ResolveError::missing_callback("compose_time_period_query"))
    }

    /// Restrict `field` to the window `[start, end]`
    fn compose_time_range_query(
        &self,
        _field: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Self::Query, ResolveError> {
        Err(ResolveError::missing_callback("compose_time_range_query"))
    }

    /// Compare `field` against the instant computed by a fixed time period
    fn compose_fixed_time_period_query(
        &self,
        _field: &str,
        _value: DateTime<Utc>,
        _operator: TimePeriodOperator,
    ) -> Result<Self::Query, ResolveError> {
        Err(ResolveError::missing_callback(
            "compose_fixed_time_period_query",
        ))
    }

    /// Merge sibling queries by structural union rather than an explicit
    /// conjunction operator
    fn combine_queries(&self, _queries: Vec<Self::Query>) -> Result<Self::Query, ResolveError> {
        Err(ResolveError::missing_callback("combine_queries"))
    }
}
