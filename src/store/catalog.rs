//! Live attribute catalog.
//!
//! The catalog is a per-attribute schema summary derived from the facts that
//! have been inserted so far. It is updated through the pure function
//! [`observe`], one fact at a time, and only ever grows: types widen to
//! [`ValueType::Mixed`] and cardinality flips to [`Cardinality::Many`], never
//! the other way around.

use std::collections::HashSet;

use serde::Serialize;

use crate::atom::Atom;
use crate::store::Fact;

/// Number of example values kept per attribute.
pub const MAX_EXAMPLES: usize = 5;

/// Inferred value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Mixed,
}

impl ValueType {
    pub fn of(atom: &Atom) -> Self {
        match atom {
            Atom::Str(_) | Atom::Ref(_) => ValueType::String,
            Atom::Num(_) => ValueType::Number,
            Atom::Bool(_) => ValueType::Boolean,
            Atom::Date(_) => ValueType::Date,
        }
    }

    /// Least upper bound of two observed types.
    pub fn widen(self, other: ValueType) -> Self {
        if self == other {
            self
        } else {
            ValueType::Mixed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

/// Schema summary for one attribute.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub attribute: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub cardinality: Cardinality,
    pub distinct_count: usize,
    pub examples: Vec<Atom>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Canonical keys of every value seen, backing `distinct_count`
    #[serde(skip)]
    seen: HashSet<String>,
}

/// Fold one fact into an attribute's catalog entry.
///
/// `entity_multiplicity` is the number of facts the fact's entity now holds
/// for this attribute, the fact itself included.
pub fn observe(entry: Option<CatalogEntry>, fact: &Fact, entity_multiplicity: usize) -> CatalogEntry {
    let observed = ValueType::of(&fact.value);
    let mut entry = match entry {
        Some(mut e) => {
            e.value_type = e.value_type.widen(observed);
            e
        }
        None => CatalogEntry {
            attribute: fact.attribute.clone(),
            value_type: observed,
            ..CatalogEntry::default()
        },
    };

    if entity_multiplicity >= 2 {
        entry.cardinality = Cardinality::Many;
    }

    if entry.seen.insert(fact.value.canonical_key()) {
        entry.distinct_count += 1;
        if entry.examples.len() < MAX_EXAMPLES {
            entry.examples.push(fact.value.clone());
        }
    }

    if let Atom::Num(n) = fact.value {
        entry.min = Some(entry.min.map_or(n, |m| m.min(n)));
        entry.max = Some(entry.max.map_or(n, |m| m.max(n)));
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(entity: &str, value: impl Into<Atom>) -> Fact {
        Fact::new(entity, "views", value)
    }

    #[test]
    fn first_observation_sets_type() {
        let e = observe(None, &fact("post:1", 10i64), 1);
        assert_eq!(e.attribute, "views");
        assert_eq!(e.value_type, ValueType::Number);
        assert_eq!(e.cardinality, Cardinality::One);
        assert_eq!(e.distinct_count, 1);
        assert_eq!((e.min, e.max), (Some(10.0), Some(10.0)));
    }

    #[test]
    fn widening_sticks() {
        let e = observe(None, &fact("post:1", 10i64), 1);
        let e = observe(Some(e), &fact("post:2", "many"), 1);
        assert_eq!(e.value_type, ValueType::Mixed);
        let e = observe(Some(e), &fact("post:3", 5i64), 1);
        assert_eq!(e.value_type, ValueType::Mixed);
        assert_eq!(e.min, Some(5.0));
    }

    #[test]
    fn examples_are_distinct_and_capped() {
        let mut entry = None;
        for i in 0..8i64 {
            entry = Some(observe(entry, &fact("post:1", i % 7), 1));
        }
        let e = entry.unwrap();
        assert_eq!(e.distinct_count, 7);
        assert_eq!(e.examples.len(), MAX_EXAMPLES);
    }

    #[test]
    fn multiplicity_flips_cardinality() {
        let e = observe(None, &fact("post:1", "a"), 1);
        let e = observe(Some(e), &fact("post:1", "b"), 2);
        assert_eq!(e.cardinality, Cardinality::Many);
        let e = observe(Some(e), &fact("post:2", "c"), 1);
        assert_eq!(e.cardinality, Cardinality::Many);
    }
}
