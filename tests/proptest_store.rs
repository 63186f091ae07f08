//! Property tests for the fact store, ingestion and the catalog

mod generators;

use factql::atom::Atom;
use factql::ingest::{ingest, ingest_collection, IngestOptions};
use factql::store::{Fact, FactStore, ValueType};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every index returns exactly the facts a scan would.
    #[test]
    fn indexes_agree_with_scan(facts in generators::arb_facts(40)) {
        let mut store = FactStore::new();
        store.add_facts(facts.clone());

        for fact in &facts {
            let by_value = store.facts_by_value(&fact.attribute, &fact.value);
            let expected = facts
                .iter()
                .filter(|f| f.attribute == fact.attribute && f.value.canonical_key() == fact.value.canonical_key())
                .count();
            prop_assert_eq!(by_value.len(), expected);

            let by_pair = store.facts_by_entity_attribute(&fact.entity, &fact.attribute);
            let expected = facts
                .iter()
                .filter(|f| f.entity == fact.entity && f.attribute == fact.attribute)
                .count();
            prop_assert_eq!(by_pair.len(), expected);
        }
        prop_assert_eq!(store.facts().len(), facts.len());
    }

    /// Ingestion never emits nulls and always starts with the type fact,
    /// even when the record repeats its label under its own `type` key.
    #[test]
    fn ingest_emits_type_first(value in generators::arb_json(), label in generators::arb_identifier()) {
        let facts = ingest(&value, "x:1", &label);
        prop_assert!(!facts.is_empty());
        prop_assert_eq!(&facts[0].attribute, "type");
        prop_assert_eq!(&facts[0].value, &Atom::Str(label.clone()));
        let labelled = facts
            .iter()
            .filter(|f| f.attribute == "type" && f.value == Atom::Str(label.clone()))
            .count();
        prop_assert_eq!(labelled, 1);
        for fact in &facts {
            prop_assert_eq!(&fact.entity, "x:1");
            prop_assert!(!fact.attribute.is_empty());
        }
    }

    /// Once an attribute widens to mixed it stays mixed.
    #[test]
    fn catalog_widening_is_sticky(values in prop::collection::vec(generators::arb_atom(), 1..30)) {
        let mut store = FactStore::new();
        let mut mixed = false;
        let mut first_type: Option<char> = None;
        for (i, value) in values.iter().enumerate() {
            store.add_facts(vec![Fact::new(format!("e:{}", i), "attr", value.clone())]);
            let tag = value.tag();
            match first_type {
                None => first_type = Some(tag),
                Some(t) if t != tag => mixed = true,
                _ => {}
            }
            let entry = store.catalog_entry("attr").unwrap();
            prop_assert_eq!(entry.value_type == ValueType::Mixed, mixed);
        }
    }

    /// Examples are capped and distinct counts never exceed the fact count.
    #[test]
    fn catalog_bounds(facts in generators::arb_facts(60)) {
        let mut store = FactStore::new();
        store.add_facts(facts.clone());
        for entry in store.catalog() {
            prop_assert!(entry.examples.len() <= 5);
            let total = facts.iter().filter(|f| f.attribute == entry.attribute).count();
            prop_assert!(entry.distinct_count <= total);
            prop_assert!(entry.distinct_count >= 1);
        }
    }

    /// A collection of n records yields n entities with positional ids.
    #[test]
    fn collection_entity_count(records in generators::arb_records(&["views", "likes"], 10)) {
        let n = records.as_array().map(Vec::len).unwrap_or(0);
        let mut store = FactStore::new();
        store.add_facts(ingest_collection(&records, "post", "id", IngestOptions::default()));
        prop_assert_eq!(store.stats().entity_count, n);
        for i in 0..n {
            let id = format!("post:#{}", i);
            prop_assert_eq!(store.facts_by_entity_attribute(&id, "type").len(), 1);
        }
    }
}
