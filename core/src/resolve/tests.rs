//! Tests for the resolution engine

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use super::*;
use crate::builder::{and, compose, not, or};
use crate::registry::{SegmentDefinition, SegmentDefinitions};
use crate::time::{ReferenceDate, TimeOffset, TimePeriodOperator, TimeUnit};
use crate::types::SegmentValue;

/// Composer rendering every intent as a readable string
struct Trace;

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

impl QueryComposer for Trace {
    type Query = String;

    fn compose_and_query(&self, queries: Vec<String>) -> String {
        format!("AND({})", queries.join(", "))
    }

    fn compose_or_query(&self, queries: Vec<String>) -> String {
        format!("OR({})", queries.join(", "))
    }

    fn compose_not_query(&self, queries: Vec<String>) -> String {
        format!("NOT({})", queries.join(", "))
    }

    fn negate_query(&self, field: &str, value: &SegmentValue) -> String {
        format!("{field}!={value}")
    }

    fn compose_time_period_query(
        &self,
        field: &str,
        value: DateTime<Utc>,
        operator: TimePeriodOperator,
        negate: bool,
    ) -> Result<String, ResolveError> {
        let prefix = if negate { "!" } else { "" };
        Ok(format!("{prefix}{field}{}{}", operator.symbol(), iso(value)))
    }

    fn compose_time_range_query(
        &self,
        field: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, ResolveError> {
        Ok(format!("{field}[{}..{}]", iso(start), iso(end)))
    }

    fn compose_fixed_time_period_query(
        &self,
        field: &str,
        value: DateTime<Utc>,
        operator: TimePeriodOperator,
    ) -> Result<String, ResolveError> {
        Ok(format!("{field}{}{}", operator.symbol(), iso(value)))
    }

    fn combine_queries(&self, queries: Vec<String>) -> Result<String, ResolveError> {
        Ok(format!("MERGE({})", queries.join(", ")))
    }
}

/// Composer with only the required callbacks
struct Bare;

impl QueryComposer for Bare {
    type Query = String;

    fn compose_and_query(&self, queries: Vec<String>) -> String {
        queries.join("&")
    }

    fn compose_or_query(&self, queries: Vec<String>) -> String {
        queries.join("|")
    }

    fn compose_not_query(&self, queries: Vec<String>) -> String {
        format!("!{}", queries.join("&"))
    }

    fn negate_query(&self, field: &str, value: &SegmentValue) -> String {
        format!("{field}!={value}")
    }
}

fn registry() -> SegmentDefinitions<String> {
    SegmentDefinitions::from_definitions([
        SegmentDefinition::new("a", |v: &SegmentValue| format!("a={v}")),
        SegmentDefinition::new("b", |v: &SegmentValue| format!("b={v}")),
        SegmentDefinition::new("c", |v: &SegmentValue| format!("c={v}")),
    ])
    .unwrap()
}

fn jan_first() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

// === Leaf rules ===

#[test]
fn test_leaf_resolves_to_definition_query() {
    let tree = and([Segment::definition("a", 1)]);
    assert_eq!(resolve(&tree, &registry(), &Trace).unwrap(), "AND(a=1)");
}

#[test]
fn test_negated_leaf_replaces_definition_query() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let registry = SegmentDefinitions::from_definitions([SegmentDefinition::new(
        "a",
        move |v: &SegmentValue| {
            seen.fetch_add(1, Ordering::SeqCst);
            format!("a={v}")
        },
    )])
    .unwrap();

    let tree = and([Segment::definition("a", "X").negated()]);
    assert_eq!(resolve(&tree, &registry, &Trace).unwrap(), "AND(a!=X)");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "builder must not run");
}

#[test]
fn test_negated_unknown_leaf_still_follows_missing_policy() {
    let tree = and([Segment::definition("zzz", 1).negated()]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap_err(),
        ResolveError::definition_not_found("zzz")
    );
}

// === Operator reduction ===

#[test]
fn test_and_preserves_child_order() {
    let tree = and([
        Segment::definition("c", 3),
        Segment::definition("a", 1),
        Segment::definition("b", 2),
    ]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap(),
        "AND(c=3, a=1, b=2)"
    );
}

#[test]
fn test_or_and_not_use_their_combinators() {
    let tree = or([Segment::definition("a", 1), Segment::definition("b", 2)]);
    assert_eq!(resolve(&tree, &registry(), &Trace).unwrap(), "OR(a=1, b=2)");

    let tree = not([Segment::definition("a", 1)]);
    assert_eq!(resolve(&tree, &registry(), &Trace).unwrap(), "NOT(a=1)");
}

#[test]
fn test_multi_child_not_receives_the_whole_group() {
    let tree = not([
        Segment::definition("a", 1),
        Segment::definition("b", 2),
        Segment::definition("c", 3),
    ]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap(),
        "NOT(a=1, b=2, c=3)"
    );
    // Bare negates the conjunction of the group
    assert_eq!(resolve(&tree, &registry(), &Bare).unwrap(), "!a=1&b=2&c=3");
}

#[test]
fn test_nested_composite_resolves_before_outer_reduction() {
    let tree = and([Segment::Composed(or([
        Segment::definition("a", 1),
        Segment::definition("b", 2),
    ]))]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap(),
        "AND(OR(a=1, b=2))"
    );
}

#[test]
fn test_deep_mixed_tree() {
    let tree = or([
        Segment::definition("a", 1),
        Segment::Composed(and([
            Segment::definition("b", 2),
            Segment::Composed(not([Segment::definition("c", 3).negated()])),
        ])),
    ]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap(),
        "OR(a=1, AND(b=2, NOT(c!=3)))"
    );
}

#[test]
fn test_combine_reduction_uses_combine_queries_for_and_only() {
    let resolver = Resolver::new().with_and_reduction(AndReduction::Combine);
    let tree = and([
        Segment::definition("a", 1),
        Segment::Composed(or([Segment::definition("b", 2), Segment::definition("c", 3)])),
    ]);
    assert_eq!(
        resolver.resolve(&tree, &registry(), &Trace).unwrap(),
        "MERGE(a=1, OR(b=2, c=3))"
    );
}

#[test]
fn test_combine_reduction_without_callback_fails() {
    let resolver = Resolver::new().with_and_reduction(AndReduction::Combine);
    let tree = and([Segment::definition("a", 1)]);
    assert_eq!(
        resolver.resolve(&tree, &registry(), &Bare).unwrap_err(),
        ResolveError::missing_callback("combine_queries")
    );
}

// === Validation at reduction time ===

#[test]
fn test_empty_composite_fails() {
    let tree = and(Vec::<Segment>::new());
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap_err(),
        ResolveError::EmptyComposite { depth: 1 }
    );

    let nested = and([
        Segment::definition("a", 1),
        Segment::Composed(or(Vec::<Segment>::new())),
    ]);
    assert_eq!(
        resolve(&nested, &registry(), &Trace).unwrap_err(),
        ResolveError::EmptyComposite { depth: 2 }
    );
}

#[test]
fn test_unknown_operator_fails() {
    let tree = and([Segment::Composed(compose(
        "XOR",
        [Segment::definition("a", 1)],
    ))]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap_err(),
        ResolveError::UnknownOperator {
            operator: "XOR".to_string(),
            depth: 2,
        }
    );
}

#[test]
fn test_lowercase_operator_is_unknown() {
    let tree: ComposedSegment = serde_json::from_value(json!({
        "operator": "and",
        "segments": [{ "type": "default", "definitionKey": "a", "value": 1 }]
    }))
    .unwrap();
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap_err(),
        ResolveError::UnknownOperator {
            operator: "and".to_string(),
            depth: 1,
        }
    );
}

#[test]
fn test_depth_limit_is_enforced() {
    let mut tree = and([Segment::definition("a", 1)]);
    for _ in 0..4 {
        tree = and([Segment::Composed(tree)]);
    }
    assert_eq!(tree.depth(), 5);

    let ok = Resolver::new().with_max_depth(5);
    assert!(ok.resolve(&tree, &registry(), &Trace).is_ok());

    let strict = Resolver::new().with_max_depth(4);
    assert_eq!(
        strict.resolve(&tree, &registry(), &Trace).unwrap_err(),
        ResolveError::DepthLimitExceeded { limit: 4 }
    );
}

#[test]
fn test_errors_abort_without_partial_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let registry = SegmentDefinitions::from_definitions([SegmentDefinition::new(
        "a",
        move |v: &SegmentValue| {
            seen.fetch_add(1, Ordering::SeqCst);
            format!("a={v}")
        },
    )])
    .unwrap();

    let tree = and([
        Segment::definition("a", 1),
        Segment::definition("missing", 2),
        Segment::definition("a", 3),
    ]);
    assert!(resolve(&tree, &registry, &Trace).is_err());
    // Resolution stops at the first failure
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// === Missing definition policy ===

#[test]
fn test_missing_definition_fails_by_default() {
    let tree = and([Segment::definition("a", 1), Segment::definition("zzz", 1)]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap_err(),
        ResolveError::definition_not_found("zzz")
    );
}

#[test]
fn test_missing_definition_fallback_runs_once_per_leaf() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let resolver = Resolver::new().with_fallback(move |leaf: &LeafSegment| {
        seen.fetch_add(1, Ordering::SeqCst);
        format!("unknown:{}", leaf.definition_key)
    });

    let tree = and([Segment::definition("a", 1), Segment::definition("zzz", 1)]);
    assert_eq!(
        resolver.resolve(&tree, &registry(), &Trace).unwrap(),
        "AND(a=1, unknown:zzz)"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_explicit_fail_policy_overrides_fallback() {
    let resolver = Resolver::new()
        .with_fallback(|_: &LeafSegment| "sentinel".to_string())
        .with_missing_definition(MissingDefinitionPolicy::Fail);
    let tree = and([Segment::definition("zzz", 1)]);
    assert!(resolver.resolve(&tree, &registry(), &Trace).is_err());
}

// === Time segments ===

#[test]
fn test_time_period_passes_negate_to_composer() {
    let tree = and([
        Segment::time_period("createdAt", jan_first(), TimePeriodOperator::Gt),
        Segment::time_period("createdAt", jan_first(), TimePeriodOperator::Gt).negated(),
    ]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap(),
        "AND(createdAt>2021-01-01T00:00:00Z, !createdAt>2021-01-01T00:00:00Z)"
    );
}

#[test]
fn test_time_period_now_uses_pinned_clock() {
    let resolver = Resolver::new().with_now(clock());
    let tree = and([Segment::time_period(
        "createdAt",
        ReferenceDate::Now,
        TimePeriodOperator::Lte,
    )]);
    assert_eq!(
        resolver.resolve(&tree, &registry(), &Trace).unwrap(),
        "AND(createdAt<=2024-03-10T12:00:00Z)"
    );
}

#[test]
fn test_time_range_bounds_are_offsets_from_reference() {
    let tree = and([Segment::time_range(
        "event_date",
        jan_first(),
        TimeOffset::before(7, TimeUnit::Day),
        TimeOffset::after(4, TimeUnit::Day),
    )]);
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap(),
        "AND(event_date[2020-12-25T00:00:00Z..2021-01-05T00:00:00Z])"
    );
}

#[test]
fn test_zero_offset_bound_is_the_reference_instant() {
    let resolver = Resolver::new().with_now(clock());
    let tree = and([Segment::time_range(
        "lastUpdated",
        ReferenceDate::Now,
        TimeOffset {
            value: 0,
            unit: Some(TimeUnit::Year),
            operator_relative_to_reference: Some(crate::time::Direction::Before),
        },
        TimeOffset::after(7, TimeUnit::Day),
    )]);
    assert_eq!(
        resolver.resolve(&tree, &registry(), &Trace).unwrap(),
        "AND(lastUpdated[2024-03-10T12:00:00Z..2024-03-17T12:00:00Z])"
    );
}

#[test]
fn test_fixed_time_period_defaults_to_before() {
    let tree: ComposedSegment = serde_json::from_value(json!({
        "operator": "AND",
        "segments": [{
            "type": "fixed_timeperiod",
            "referenceDate": "2021-01-01T00:00:00Z",
            "options": { "field": "timestamp", "operator": "less than", "value": 7, "unit": "day" }
        }]
    }))
    .unwrap();
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap(),
        "AND(timestamp<2020-12-25T00:00:00Z)"
    );
}

#[test]
fn test_time_leaves_need_their_callbacks() {
    let period = and([Segment::time_period(
        "f",
        jan_first(),
        TimePeriodOperator::Gt,
    )]);
    assert_eq!(
        resolve(&period, &registry(), &Bare).unwrap_err(),
        ResolveError::missing_callback("compose_time_period_query")
    );

    let range = and([Segment::time_range(
        "f",
        jan_first(),
        TimeOffset::zero(),
        TimeOffset::zero(),
    )]);
    assert_eq!(
        resolve(&range, &registry(), &Bare).unwrap_err(),
        ResolveError::missing_callback("compose_time_range_query")
    );

    let fixed = and([Segment::fixed_time_period(
        "f",
        jan_first(),
        1,
        TimeUnit::Day,
        TimePeriodOperator::Lt,
    )]);
    assert_eq!(
        resolve(&fixed, &registry(), &Bare).unwrap_err(),
        ResolveError::missing_callback("compose_fixed_time_period_query")
    );
}

#[test]
fn test_incomplete_time_offset_fails() {
    let tree: ComposedSegment = serde_json::from_value(json!({
        "operator": "AND",
        "segments": [{
            "type": "time_range",
            "field": "lastUpdated",
            "referenceDate": "now",
            "options": { "start": { "value": 3 }, "end": { "value": 0 } }
        }]
    }))
    .unwrap();
    assert_eq!(
        resolve(&tree, &registry(), &Trace).unwrap_err(),
        ResolveError::IncompleteTimeOffset {
            field: "lastUpdated".to_string(),
            value: 3,
            missing: "unit",
        }
    );
}

// === Concrete scenario ===

/// Mongo-like composer whose AND is a conjunction list
struct ConjunctionList;

impl QueryComposer for ConjunctionList {
    type Query = Value;

    fn compose_and_query(&self, queries: Vec<Value>) -> Value {
        Value::Array(queries)
    }

    fn compose_or_query(&self, queries: Vec<Value>) -> Value {
        json!({ "$or": queries })
    }

    fn compose_not_query(&self, queries: Vec<Value>) -> Value {
        json!({ "$nor": queries })
    }

    fn negate_query(&self, field: &str, value: &SegmentValue) -> Value {
        json!({ field: { "$ne": value.to_json() } })
    }
}

#[test]
fn test_original_source_scenario() {
    let registry = SegmentDefinitions::from_definitions([SegmentDefinition::new(
        "originalSource",
        |v: &SegmentValue| json!({ "originalSource": v.to_json() }),
    )])
    .unwrap();

    let tree: ComposedSegment = serde_json::from_value(json!({
        "type": "composed",
        "operator": "AND",
        "segments": [
            { "type": "default", "definitionKey": "originalSource", "value": "Google" },
            { "type": "default", "definitionKey": "originalSource", "value": "X", "negate": true }
        ]
    }))
    .unwrap();

    assert_eq!(
        resolve(&tree, &registry, &ConjunctionList).unwrap(),
        json!([
            { "originalSource": "Google" },
            ConjunctionList.negate_query("originalSource", &SegmentValue::from("X"))
        ])
    );
}

#[test]
fn test_resolution_leaves_inputs_untouched() {
    let tree = and([
        Segment::definition("a", 1),
        Segment::Composed(or([Segment::definition("b", 2)])),
    ]);
    let before = tree.clone();
    let registry = registry();
    let first = resolve(&tree, &registry, &Trace).unwrap();
    let second = resolve(&tree, &registry, &Trace).unwrap();
    assert_eq!(first, second);
    assert_eq!(tree, before);
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_slice_registry_resolves_like_indexed_registry() {
    let defs = vec![SegmentDefinition::new("a", |v: &SegmentValue| format!("a={v}"))];
    let tree = and([Segment::definition("a", 1)]);
    assert_eq!(resolve(&tree, defs.as_slice(), &Trace).unwrap(), "AND(a=1)");
}
