//! Segment tree model
//!
//! Trees are plain serde data so they can be built in one place (typically a
//! front end) and resolved in another. The JSON form uses an internal `"type"`
//! tag and camelCase field names:
//!
//! ```json
//! {
//!   "type": "composed",
//!   "operator": "AND",
//!   "segments": [
//!     { "type": "default", "definitionKey": "originalSource", "value": "Google" },
//!     { "type": "timeperiod", "field": "createdAt", "value": "now", "operator": "LT" }
//!   ]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::{
    Direction, ReferenceDate, TimeOffset, TimePeriodOperator, TimeUnit, deserialize_fixed_operator,
    deserialize_offset_value,
};

/// Primitive value bound into a segment definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SegmentValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for SegmentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for SegmentValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SegmentValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for SegmentValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for SegmentValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for SegmentValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for SegmentValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Boolean operator of a composed segment
///
/// Only the exact tokens `AND`, `OR` and `NOT` are recognised. Anything else,
/// including other casings, is kept verbatim in [`CompositionOperator::Other`]
/// so a malformed tree still deserializes and is rejected at reduction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompositionOperator {
    And,
    Or,
    Not,
    Other(String),
}

impl CompositionOperator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for CompositionOperator {
    fn from(s: &str) -> Self {
        match s {
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for CompositionOperator {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<CompositionOperator> for String {
    fn from(op: CompositionOperator) -> Self {
        match op {
            CompositionOperator::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CompositionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Leaf bound to a registered segment definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafSegment {
    pub definition_key: String,
    pub value: SegmentValue,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negate: bool,
}

/// Single-bound comparison of a time field against a reference date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriodSegment {
    pub field: String,
    pub value: ReferenceDate,
    pub operator: TimePeriodOperator,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negate: bool,
}

/// Start and end offsets of a [`TimeRangeSegment`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeOptions {
    pub start: TimeOffset,
    pub end: TimeOffset,
}

/// Time window whose bounds are offsets from a reference date
///
/// `field` is written at the top level. On input it may also sit inside
/// `options`, the shape produced by older front ends; the top-level value wins
/// when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TimeRangeInput")]
pub struct TimeRangeSegment {
    pub field: String,
    pub reference_date: ReferenceDate,
    pub options: TimeRangeOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeRangeInput {
    #[serde(default)]
    field: Option<String>,
    reference_date: ReferenceDate,
    options: TimeRangeOptionsInput,
}

#[derive(Deserialize)]
struct TimeRangeOptionsInput {
    #[serde(default)]
    field: Option<String>,
    start: TimeOffset,
    end: TimeOffset,
}

impl TryFrom<TimeRangeInput> for TimeRangeSegment {
    type Error = String;

    fn try_from(input: TimeRangeInput) -> Result<Self, Self::Error> {
        let field = input
            .field
            .or(input.options.field)
            .ok_or_else(|| "missing field `field`".to_string())?;
        Ok(Self {
            field,
            reference_date: input.reference_date,
            options: TimeRangeOptions {
                start: input.options.start,
                end: input.options.end,
            },
        })
    }
}

/// Options of a [`FixedTimePeriodSegment`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedTimePeriodOptions {
    pub field: String,
    #[serde(deserialize_with = "deserialize_offset_value")]
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<TimeUnit>,
    /// Canonical token or long spelling such as `"less than"`
    #[serde(deserialize_with = "deserialize_fixed_operator")]
    pub operator: TimePeriodOperator,
    /// Defaults to `before` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_relative_to_reference: Option<Direction>,
}

impl FixedTimePeriodOptions {
    pub fn offset(&self) -> TimeOffset {
        TimeOffset {
            value: self.value,
            unit: self.unit,
            operator_relative_to_reference: self.operator_relative_to_reference,
        }
    }
}

/// One offset from a reference date compared with a single operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedTimePeriodSegment {
    pub reference_date: ReferenceDate,
    pub options: FixedTimePeriodOptions,
}

/// Internal tree node combining child segments with AND/OR/NOT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedSegment {
    pub operator: CompositionOperator,
    pub segments: Vec<Segment>,
}

impl ComposedSegment {
    /// Number of composed levels, counting this node as 1
    pub fn depth(&self) -> usize {
        let mut max = 1;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            for child in &node.segments {
                if let Segment::Composed(c) = child {
                    stack.push((c, depth + 1));
                }
            }
        }
        max
    }

    /// Total number of segments below this node, composed ones included
    pub fn segment_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += node.segments.len();
            for child in &node.segments {
                if let Segment::Composed(c) = child {
                    stack.push(c);
                }
            }
        }
        count
    }
}

/// Any node of a segment tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Segment {
    #[serde(rename = "default")]
    Definition(LeafSegment),
    #[serde(rename = "timeperiod")]
    TimePeriod(TimePeriodSegment),
    #[serde(rename = "time_range", alias = "timerange")]
    TimeRange(TimeRangeSegment),
    #[serde(rename = "fixed_timeperiod")]
    FixedTimePeriod(FixedTimePeriodSegment),
    #[serde(rename = "composed")]
    Composed(ComposedSegment),
}

impl Segment {
    /// Wire name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Definition(_) => "default",
            Self::TimePeriod(_) => "timeperiod",
            Self::TimeRange(_) => "time_range",
            Self::FixedTimePeriod(_) => "fixed_timeperiod",
            Self::Composed(_) => "composed",
        }
    }
}

impl From<LeafSegment> for Segment {
    fn from(s: LeafSegment) -> Self {
        Self::Definition(s)
    }
}

impl From<TimePeriodSegment> for Segment {
    fn from(s: TimePeriodSegment) -> Self {
        Self::TimePeriod(s)
    }
}

impl From<TimeRangeSegment> for Segment {
    fn from(s: TimeRangeSegment) -> Self {
        Self::TimeRange(s)
    }
}

impl From<FixedTimePeriodSegment> for Segment {
    fn from(s: FixedTimePeriodSegment) -> Self {
        Self::FixedTimePeriod(s)
    }
}

impl From<ComposedSegment> for Segment {
    fn from(s: ComposedSegment) -> Self {
        Self::Composed(s)
    }
}
