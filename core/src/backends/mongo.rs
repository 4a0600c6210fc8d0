//! MongoDB filter documents
//!
//! Queries are `serde_json::Value` documents in the shape accepted by a
//! MongoDB `find` filter. Instants are written as RFC 3339 strings with
//! millisecond precision.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::composer::QueryComposer;
use crate::error::ResolveError;
use crate::rules::{FieldComparison, FieldComposer};
use crate::time::TimePeriodOperator;
use crate::types::SegmentValue;

#[derive(Debug, Clone, Copy, Default)]
pub struct MongoComposer;

fn operator_key(operator: TimePeriodOperator) -> &'static str {
    match operator {
        TimePeriodOperator::Gt => "$gt",
        TimePeriodOperator::Lt => "$lt",
        TimePeriodOperator::Gte => "$gte",
        TimePeriodOperator::Lte => "$lte",
    }
}

fn instant(value: DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Escape regex metacharacters so `s` matches literally
pub fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl QueryComposer for MongoComposer {
    type Query = Value;

    fn compose_and_query(&self, queries: Vec<Value>) -> Value {
        json!({ "$and": queries })
    }

    fn compose_or_query(&self, queries: Vec<Value>) -> Value {
        json!({ "$or": queries })
    }

    fn compose_not_query(&self, mut queries: Vec<Value>) -> Value {
        if queries.len() == 1 {
            return json!({ "$nor": [queries.remove(0)] });
        }
        json!({ "$nor": [{ "$and": queries }] })
    }

    fn negate_query(&self, field: &str, value: &SegmentValue) -> Value {
        json!({ field: { "$ne": value.to_json() } })
    }

    fn compose_time_period_query(
        &self,
        field: &str,
        value: DateTime<Utc>,
        operator: TimePeriodOperator,
        negate: bool,
    ) -> Result<Value, ResolveError> {
        let operator = if negate { operator.negated() } else { operator };
        Ok(json!({ field: { operator_key(operator): instant(value) } }))
    }

    fn compose_time_range_query(
        &self,
        field: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Value, ResolveError> {
        Ok(json!({ field: { "$gte": instant(start), "$lte": instant(end) } }))
    }

    fn compose_fixed_time_period_query(
        &self,
        field: &str,
        value: DateTime<Utc>,
        operator: TimePeriodOperator,
    ) -> Result<Value, ResolveError> {
        Ok(json!({ field: { operator_key(operator): instant(value) } }))
    }

    /// Shallow merge of filter documents. Documents whose keys collide with
    /// an earlier one (or that are not objects) are kept under `$and`.
    fn combine_queries(&self, queries: Vec<Value>) -> Result<Value, ResolveError> {
        let mut merged = Map::new();
        let mut rest = Vec::new();
        for query in queries {
            match query {
                Value::Object(doc) if !doc.keys().any(|k| merged.contains_key(k)) => {
                    merged.extend(doc);
                }
                other => rest.push(other),
            }
        }
        if rest.is_empty() {
            return Ok(Value::Object(merged));
        }
        tracing::trace!(
            conflicts = rest.len(),
            "Combined filter keeps conflicting documents under $and"
        );
        let mut all = Vec::with_capacity(rest.len() + 1);
        if !merged.is_empty() {
            all.push(Value::Object(merged));
        }
        all.extend(rest);
        Ok(json!({ "$and": all }))
    }
}

impl FieldComposer for MongoComposer {
    fn compose_field_query(
        &self,
        field: &str,
        comparison: FieldComparison,
        value: &SegmentValue,
    ) -> Value {
        let v = value.to_json();
        match comparison {
            FieldComparison::Eq => json!({ field: v }),
            FieldComparison::Ne => json!({ field: { "$ne": v } }),
            FieldComparison::Gt => json!({ field: { "$gt": v } }),
            FieldComparison::Gte => json!({ field: { "$gte": v } }),
            FieldComparison::Lt => json!({ field: { "$lt": v } }),
            FieldComparison::Lte => json!({ field: { "$lte": v } }),
            // Equality on an array field already matches membership
            FieldComparison::Contains => match value.as_str() {
                Some(s) => json!({ field: { "$regex": escape_regex(s) } }),
                None => json!({ field: v }),
            },
        }
    }

    fn match_all(&self) -> Value {
        json!({})
    }

    fn match_none(&self) -> Value {
        json!({ "_id": { "$exists": false } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::builder::{and, not, or};
    use crate::registry::{SegmentDefinition, SegmentDefinitions};
    use crate::resolve::{AndReduction, Resolver, resolve};
    use crate::time::{TimeOffset, TimeUnit};
    use crate::types::Segment;

    fn growth_registry() -> SegmentDefinitions<Value> {
        SegmentDefinitions::from_definitions([
            SegmentDefinition::new("originalSource", |v: &SegmentValue| {
                json!({ "originalSource": v.to_json() })
            }),
            SegmentDefinition::new("customerOrProspect", |v: &SegmentValue| {
                if v.as_str() == Some("customer") {
                    json!({ "totalTransactions": { "$gt": 0 } })
                } else {
                    json!({ "totalTransactions": 0 })
                }
            }),
        ])
        .unwrap()
    }

    #[test]
    fn test_original_source_scenario() {
        let tree = and([
            Segment::definition("originalSource", "Google"),
            Segment::definition("originalSource", "Facebook").negated(),
        ]);
        let query = resolve(&tree, &growth_registry(), &MongoComposer).unwrap();
        assert_eq!(
            query,
            json!({ "$and": [
                { "originalSource": "Google" },
                { "originalSource": { "$ne": "Facebook" } }
            ] })
        );
    }

    #[test]
    fn test_not_uses_nor() {
        let single = not([Segment::definition("originalSource", "Google")]);
        assert_eq!(
            resolve(&single, &growth_registry(), &MongoComposer).unwrap(),
            json!({ "$nor": [{ "originalSource": "Google" }] })
        );

        let multi = not([
            Segment::definition("originalSource", "Google"),
            Segment::definition("customerOrProspect", "customer"),
        ]);
        assert_eq!(
            resolve(&multi, &growth_registry(), &MongoComposer).unwrap(),
            json!({ "$nor": [{ "$and": [
                { "originalSource": "Google" },
                { "totalTransactions": { "$gt": 0 } }
            ] }] })
        );
    }

    #[test]
    fn test_time_period_negate_flips_operator() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            MongoComposer
                .compose_time_period_query("createdAt", at, TimePeriodOperator::Gt, true)
                .unwrap(),
            json!({ "createdAt": { "$lte": "2024-03-01T00:00:00.000Z" } })
        );
        assert_eq!(
            MongoComposer
                .compose_time_period_query("createdAt", at, TimePeriodOperator::Gt, false)
                .unwrap(),
            json!({ "createdAt": { "$gt": "2024-03-01T00:00:00.000Z" } })
        );
    }

    #[test]
    fn test_time_range_resolves_window() {
        let tree = or([Segment::time_range(
            "lastSeen",
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            TimeOffset::before(7, TimeUnit::Day),
            TimeOffset::zero(),
        )]);
        assert_eq!(
            resolve(&tree, &growth_registry(), &MongoComposer).unwrap(),
            json!({ "$or": [{ "lastSeen": {
                "$gte": "2024-03-03T12:00:00.000Z",
                "$lte": "2024-03-10T12:00:00.000Z"
            } }] })
        );
    }

    #[test]
    fn test_combine_merges_disjoint_keys() {
        let tree = and([
            Segment::definition("originalSource", "Google"),
            Segment::definition("customerOrProspect", "customer"),
        ]);
        let resolver = Resolver::new().with_and_reduction(AndReduction::Combine);
        assert_eq!(
            resolver
                .resolve(&tree, &growth_registry(), &MongoComposer)
                .unwrap(),
            json!({ "originalSource": "Google", "totalTransactions": { "$gt": 0 } })
        );
    }

    #[test]
    fn test_combine_keeps_conflicts_under_and() {
        let combined = MongoComposer
            .combine_queries(vec![
                json!({ "a": 1 }),
                json!({ "b": 2 }),
                json!({ "a": 3 }),
            ])
            .unwrap();
        assert_eq!(
            combined,
            json!({ "$and": [{ "a": 1, "b": 2 }, { "a": 3 }] })
        );
    }

    #[test]
    fn test_field_comparisons() {
        assert_eq!(
            MongoComposer.compose_field_query("age", FieldComparison::Gte, &SegmentValue::Int(18)),
            json!({ "age": { "$gte": 18 } })
        );
        assert_eq!(
            MongoComposer.compose_field_query(
                "email",
                FieldComparison::Contains,
                &SegmentValue::from("a.b+c")
            ),
            json!({ "email": { "$regex": "a\\.b\\+c" } })
        );
        assert_eq!(
            MongoComposer.compose_field_query(
                "tags",
                FieldComparison::Contains,
                &SegmentValue::Int(3)
            ),
            json!({ "tags": 3 })
        );
    }

    #[test]
    fn test_match_helpers() {
        assert_eq!(MongoComposer.match_all(), json!({}));
        assert_eq!(
            MongoComposer.match_none(),
            json!({ "_id": { "$exists": false } })
        );
    }
}
