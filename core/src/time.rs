//! Relative-date arithmetic
//!
//! Time-based segments carry a reference date (a fixed instant or the literal
//! `"now"`) and offsets expressed as a count of calendar units before or after
//! that reference. This module resolves both into concrete UTC instants.

use std::fmt;

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::ResolveError;

/// Literal accepted in place of a fixed anchor
pub const NOW: &str = "now";

/// Anchor instant for time-based segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReferenceDate {
    /// Wall-clock time at resolution
    Now,
    Fixed(DateTime<Utc>),
}

impl ReferenceDate {
    /// Resolve to an instant, substituting `now` for [`ReferenceDate::Now`]
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Now => now,
            Self::Fixed(dt) => *dt,
        }
    }

    /// Parse `"now"`, an RFC 3339 timestamp, a naive `YYYY-MM-DDTHH:MM:SS`
    /// timestamp (taken as UTC) or a bare `YYYY-MM-DD` date (midnight UTC)
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s == NOW {
            return Ok(Self::Now);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::Fixed(dt.with_timezone(&Utc)));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(Self::Fixed(naive.and_utc()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            && let Some(midnight) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(Self::Fixed(midnight.and_utc()));
        }
        Err(format!(
            "Invalid reference date '{}'. Expected \"now\", an RFC 3339 timestamp or YYYY-MM-DD",
            s
        ))
    }
}

impl From<DateTime<Utc>> for ReferenceDate {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Fixed(dt)
    }
}

impl TryFrom<String> for ReferenceDate {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ReferenceDate> for String {
    fn from(r: ReferenceDate) -> Self {
        r.to_string()
    }
}

impl fmt::Display for ReferenceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Now => write!(f, "{}", NOW),
            Self::Fixed(dt) => write!(
                f,
                "{}",
                dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
            ),
        }
    }
}

/// Calendar unit for relative offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[serde(alias = "seconds")]
    Second,
    #[serde(alias = "minutes")]
    Minute,
    #[serde(alias = "hours")]
    Hour,
    #[serde(alias = "days")]
    Day,
    #[serde(alias = "weeks")]
    Week,
    #[serde(alias = "months")]
    Month,
    #[serde(alias = "years")]
    Year,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// Direction of an offset relative to its reference date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Before,
    After,
}

/// Comparison applied by single-bound time segments
///
/// Deserializes from the exact tokens `GT`, `LT`, `GTE` and `LTE`. Fixed
/// periods additionally accept the long spellings, see
/// [`TimePeriodOperator::from_fixed_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePeriodOperator {
    #[serde(rename = "GT")]
    Gt,
    #[serde(rename = "LT")]
    Lt,
    #[serde(rename = "GTE")]
    Gte,
    #[serde(rename = "LTE")]
    Lte,
}

impl TimePeriodOperator {
    /// Parse a fixed-period operator: a canonical token or its long spelling
    /// (`"less than"`, `"greater than or equal"`, ...)
    pub fn from_fixed_token(s: &str) -> Option<Self> {
        match s {
            "GT" | "greater than" => Some(Self::Gt),
            "LT" | "less than" => Some(Self::Lt),
            "GTE" | "greater than or equal" | "greater than or equal to" => Some(Self::Gte),
            "LTE" | "less than or equal" | "less than or equal to" => Some(Self::Lte),
            _ => None,
        }
    }

    /// The complementary comparison (`GT` becomes `LTE`, and so on)
    pub fn negated(&self) -> Self {
        match self {
            Self::Gt => Self::Lte,
            Self::Lt => Self::Gte,
            Self::Gte => Self::Lt,
            Self::Lte => Self::Gt,
        }
    }

    /// Infix symbol as used by SQL
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }

    /// Whether `lhs <op> rhs` holds
    pub fn compare<T: PartialOrd>(&self, lhs: &T, rhs: &T) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Lt => lhs < rhs,
            Self::Gte => lhs >= rhs,
            Self::Lte => lhs <= rhs,
        }
    }
}

/// Serde adapter for [`TimePeriodOperator::from_fixed_token`]
pub(crate) fn deserialize_fixed_operator<'de, D>(d: D) -> Result<TimePeriodOperator, D::Error>
where
    D: Deserializer<'de>,
{
    let token = String::deserialize(d)?;
    TimePeriodOperator::from_fixed_token(&token).ok_or_else(|| {
        de::Error::custom(format!(
            "Invalid time period operator '{}'. Expected GT, LT, GTE, LTE or a long form such as \"less than\"",
            token
        ))
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OffsetNumber {
    Int(i64),
    Float(f64),
}

/// Offset counts are whole units; `7.0` is accepted, `1.5` is not
pub(crate) fn deserialize_offset_value<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match OffsetNumber::deserialize(d)? {
        OffsetNumber::Int(i) => Ok(i),
        OffsetNumber::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        OffsetNumber::Float(f) => Err(de::Error::custom(format!(
            "Invalid offset value {}. Offsets are a whole number of units",
            f
        ))),
    }
}

/// One bound of a relative time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOffset {
    #[serde(deserialize_with = "deserialize_offset_value")]
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<TimeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_relative_to_reference: Option<Direction>,
}

impl TimeOffset {
    /// Offset that resolves to the reference date itself
    pub fn zero() -> Self {
        Self {
            value: 0,
            unit: None,
            operator_relative_to_reference: None,
        }
    }

    pub fn before(value: i64, unit: TimeUnit) -> Self {
        Self {
            value,
            unit: Some(unit),
            operator_relative_to_reference: Some(Direction::Before),
        }
    }

    pub fn after(value: i64, unit: TimeUnit) -> Self {
        Self {
            value,
            unit: Some(unit),
            operator_relative_to_reference: Some(Direction::After),
        }
    }

    /// Apply the offset to `reference`.
    ///
    /// A zero value yields `reference` unchanged; unit and direction are not
    /// consulted. Otherwise both must be known, `default_direction` filling in
    /// an absent direction. `field` only labels errors.
    pub fn apply(
        &self,
        reference: DateTime<Utc>,
        field: &str,
        default_direction: Option<Direction>,
    ) -> Result<DateTime<Utc>, ResolveError> {
        if self.value == 0 {
            return Ok(reference);
        }

        let unit = self.unit.ok_or_else(|| ResolveError::IncompleteTimeOffset {
            field: field.to_string(),
            value: self.value,
            missing: "unit",
        })?;
        let direction = self
            .operator_relative_to_reference
            .or(default_direction)
            .ok_or_else(|| ResolveError::IncompleteTimeOffset {
                field: field.to_string(),
                value: self.value,
                missing: "operatorRelativeToReference",
            })?;

        shift(reference, self.value, unit, direction).ok_or_else(|| ResolveError::TimeOverflow {
            field: field.to_string(),
        })
    }
}

/// Shift `reference` by `value` units in `direction`.
///
/// Months and years use calendar arithmetic (day clamped to month end).
/// Returns `None` when the result leaves chrono's representable range.
pub fn shift(
    reference: DateTime<Utc>,
    value: i64,
    unit: TimeUnit,
    direction: Direction,
) -> Option<DateTime<Utc>> {
    let signed = match direction {
        Direction::Before => value.checked_neg()?,
        Direction::After => value,
    };

    let delta = match unit {
        TimeUnit::Second => TimeDelta::try_seconds(signed),
        TimeUnit::Minute => TimeDelta::try_minutes(signed),
        TimeUnit::Hour => TimeDelta::try_hours(signed),
        TimeUnit::Day => TimeDelta::try_days(signed),
        TimeUnit::Week => TimeDelta::try_weeks(signed),
        TimeUnit::Month => return shift_months(reference, signed),
        TimeUnit::Year => return shift_months(reference, signed.checked_mul(12)?),
    };
    reference.checked_add_signed(delta?)
}

fn shift_months(reference: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        reference.checked_add_months(magnitude)
    } else {
        reference.checked_sub_months(magnitude)
    }
}
