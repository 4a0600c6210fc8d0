//! Tree builder
//!
//! Assembles composed segments declaratively. Nothing here validates the
//! operator or the number of children: the tree may be built far from where
//! it is resolved, so checks happen in the resolver (and in
//! [`crate::parser::validate_tree`] for trees crossing a trust boundary).

use crate::time::{Direction, ReferenceDate, TimeOffset, TimePeriodOperator, TimeUnit};
use crate::types::{
    ComposedSegment, CompositionOperator, FixedTimePeriodOptions, FixedTimePeriodSegment,
    LeafSegment, Segment, SegmentValue, TimePeriodSegment, TimeRangeOptions, TimeRangeSegment,
};

/// Wrap `children` under `operator`, unchanged and in order
pub fn compose<I, S>(operator: impl Into<CompositionOperator>, children: I) -> ComposedSegment
where
    I: IntoIterator<Item = S>,
    S: Into<Segment>,
{
    ComposedSegment {
        operator: operator.into(),
        segments: children.into_iter().map(Into::into).collect(),
    }
}

pub fn and<I, S>(children: I) -> ComposedSegment
where
    I: IntoIterator<Item = S>,
    S: Into<Segment>,
{
    compose(CompositionOperator::And, children)
}

pub fn or<I, S>(children: I) -> ComposedSegment
where
    I: IntoIterator<Item = S>,
    S: Into<Segment>,
{
    compose(CompositionOperator::Or, children)
}

pub fn not<I, S>(children: I) -> ComposedSegment
where
    I: IntoIterator<Item = S>,
    S: Into<Segment>,
{
    compose(CompositionOperator::Not, children)
}

impl Segment {
    /// Leaf bound to the definition registered as `key`
    pub fn definition(key: impl Into<String>, value: impl Into<SegmentValue>) -> Self {
        Self::Definition(LeafSegment {
            definition_key: key.into(),
            value: value.into(),
            negate: false,
        })
    }

    pub fn time_period(
        field: impl Into<String>,
        value: impl Into<ReferenceDate>,
        operator: TimePeriodOperator,
    ) -> Self {
        Self::TimePeriod(TimePeriodSegment {
            field: field.into(),
            value: value.into(),
            operator,
            negate: false,
        })
    }

    pub fn time_range(
        field: impl Into<String>,
        reference_date: impl Into<ReferenceDate>,
        start: TimeOffset,
        end: TimeOffset,
    ) -> Self {
        Self::TimeRange(TimeRangeSegment {
            field: field.into(),
            reference_date: reference_date.into(),
            options: TimeRangeOptions { start, end },
        })
    }

    /// `value` units of `unit` before `reference_date`, compared with `operator`
    pub fn fixed_time_period(
        field: impl Into<String>,
        reference_date: impl Into<ReferenceDate>,
        value: i64,
        unit: TimeUnit,
        operator: TimePeriodOperator,
    ) -> Self {
        Self::FixedTimePeriod(FixedTimePeriodSegment {
            reference_date: reference_date.into(),
            options: FixedTimePeriodOptions {
                field: field.into(),
                value,
                unit: Some(unit),
                operator,
                operator_relative_to_reference: Some(Direction::Before),
            },
        })
    }

    /// Set the `negate` flag on leaves that carry one; other variants are
    /// returned unchanged
    pub fn negated(self) -> Self {
        match self {
            Self::Definition(mut leaf) => {
                leaf.negate = true;
                Self::Definition(leaf)
            }
            Self::TimePeriod(mut period) => {
                period.negate = true;
                Self::TimePeriod(period)
            }
            other => other,
        }
    }
}
