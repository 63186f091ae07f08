//! Proptest generators for factql data
//!
//! Provides `Strategy` implementations for JSON records, facts and query
//! text used in property tests.

#![allow(dead_code)]

use factql::atom::Atom;
use factql::store::Fact;
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// ============================================================================
// Name Generation
// ============================================================================

/// Generate a valid identifier (alphanumeric, starting with a lowercase letter)
pub fn arb_identifier() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,10}".prop_map(String::from)
}

/// Identifiers that never collide with EQL-S keywords
pub fn arb_attribute() -> impl Strategy<Value = String> {
    arb_identifier().prop_map(|s| format!("a_{}", s))
}

/// Object keys, occasionally the reserved `type` key
pub fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![4 => arb_attribute(), 1 => Just("type".to_string())]
}

// ============================================================================
// JSON Generation
// ============================================================================

/// Scalar JSON values, including null
pub fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1000i64..1000).prop_map(Value::from),
        (-1000.0f64..1000.0).prop_map(|f| json!(f)),
        "[a-zA-Z ]{0,12}".prop_map(Value::from),
    ]
}

/// Nested JSON: scalars, arrays and objects up to a small depth
pub fn arb_json() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Array),
            vec((arb_key(), inner), 0..4)
                .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// A flat record with a fixed set of numeric attributes
pub fn arb_record(attributes: &'static [&'static str]) -> impl Strategy<Value = Value> {
    vec(-100i64..100, attributes.len()).prop_map(move |values| {
        let fields: Map<String, Value> = attributes
            .iter()
            .zip(values)
            .map(|(a, v)| (a.to_string(), Value::from(v)))
            .collect();
        Value::Object(fields)
    })
}

/// A collection of records; ids are assigned by position
pub fn arb_records(attributes: &'static [&'static str], max: usize) -> impl Strategy<Value = Value> {
    vec(arb_record(attributes), 0..=max).prop_map(Value::Array)
}

/// Records that sometimes carry an explicit id, which may collide with
/// another record's position, and sometimes repeat their type label
pub fn arb_keyed_records(label: &'static str, max: usize) -> impl Strategy<Value = Value> {
    vec((prop::option::of(0i64..4), any::<bool>(), -100i64..100), 0..=max).prop_map(move |rows| {
        let records = rows
            .into_iter()
            .map(|(id, typed, views)| {
                let mut record = Map::new();
                if let Some(id) = id {
                    record.insert("id".to_string(), Value::from(id));
                }
                if typed {
                    record.insert("type".to_string(), Value::from(label));
                }
                record.insert("views".to_string(), Value::from(views));
                Value::Object(record)
            })
            .collect();
        Value::Array(records)
    })
}

// ============================================================================
// Fact Generation
// ============================================================================

pub fn arb_atom() -> impl Strategy<Value = Atom> {
    prop_oneof![
        any::<bool>().prop_map(Atom::Bool),
        (-50i64..50).prop_map(Atom::from),
        "[a-z]{1,4}".prop_map(Atom::Str),
    ]
}

/// Facts over a small entity and attribute space, so joins hit
pub fn arb_facts(max: usize) -> impl Strategy<Value = Vec<Fact>> {
    vec(
        (0..6usize, prop::sample::select(vec!["a", "b", "c"]), arb_atom()),
        0..=max,
    )
    .prop_map(|triples| {
        triples
            .into_iter()
            .map(|(e, a, v)| Fact::new(format!("e:{}", e), a, v))
            .collect()
    })
}

// ============================================================================
// Query Text Generation
// ============================================================================

/// Token soup drawn from the query vocabulary, for no-panic tests
pub fn arb_query_text() -> impl Strategy<Value = String> {
    let fragment = prop::sample::select(vec![
        "FIND", "AS", "WHERE", "AND", "RETURN", "ORDER", "BY", "DESC", "LIMIT", "BETWEEN",
        "CONTAINS", "MATCHES", "from", "where", "return", "|", ",", "(", ")", "?p", "?p.views",
        "?q.a.b", "post", "attr", "gt", "popular", "\"x\"", "'y'", "3", "-2.5", "true", "=", "!=",
        ">", "<=", "/^a/i", ":-", "\"", "/", "--",
    ]);
    vec(fragment, 0..16).prop_map(|parts| parts.join(" "))
}
