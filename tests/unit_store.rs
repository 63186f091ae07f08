//! Unit tests for the fact store, ingestion and the catalog

use factql::atom::Atom;
use factql::ingest::{entity_id, ingest, ingest_collection, ingest_with, IngestOptions};
use factql::store::{Cardinality, Fact, FactStore, Link, ValueType};
use serde_json::json;

fn post_store() -> FactStore {
    let mut store = FactStore::new();
    let posts = json!([
        {"id": 1, "views": 1500, "tags": ["rust", "db"]},
        {"id": 2, "views": 2000, "title": "Second"},
        {"id": 3, "views": 800},
    ]);
    store.add_facts(ingest_collection(&posts, "post", "id", IngestOptions::default()));
    store
}

// ============================================================================
// Indexes
// ============================================================================

#[test]
fn test_facts_by_entity() {
    let store = post_store();
    let facts = store.facts_by_entity("post:1");
    let attrs: Vec<&str> = facts.iter().map(|f| f.attribute.as_str()).collect();
    assert_eq!(attrs, vec!["type", "id", "views", "tags", "tags"]);
}

#[test]
fn test_facts_by_entity_attribute() {
    let store = post_store();
    let tags: Vec<&Atom> = store
        .facts_by_entity_attribute("post:1", "tags")
        .into_iter()
        .map(|f| &f.value)
        .collect();
    assert_eq!(tags, vec![&Atom::from("rust"), &Atom::from("db")]);
    assert!(store.facts_by_entity_attribute("post:3", "tags").is_empty());
}

#[test]
fn test_facts_by_attribute_in_insertion_order() {
    let store = post_store();
    let entities: Vec<&str> = store
        .facts_by_attribute("views")
        .into_iter()
        .map(|f| f.entity.as_str())
        .collect();
    assert_eq!(entities, vec!["post:1", "post:2", "post:3"]);
}

#[test]
fn test_value_index_keys_on_type() {
    let mut store = FactStore::new();
    store.add_facts(vec![
        Fact::new("a:1", "code", "1"),
        Fact::new("a:2", "code", 1i64),
    ]);
    let strings = store.facts_by_value("code", &Atom::from("1"));
    let numbers = store.facts_by_value("code", &Atom::Num(1.0));
    assert_eq!(strings.len(), 1);
    assert_eq!(strings[0].entity, "a:1");
    assert_eq!(numbers.len(), 1);
    assert_eq!(numbers[0].entity, "a:2");
}

#[test]
fn test_duplicate_facts_are_kept() {
    let mut store = FactStore::new();
    let fact = Fact::new("post:1", "views", 10i64);
    store.add_facts(vec![fact.clone()]);
    store.add_facts(vec![fact]);
    assert_eq!(store.facts().len(), 2);
    assert_eq!(store.facts_by_value("views", &Atom::Num(10.0)).len(), 2);
    assert_eq!(store.stats().entity_count, 1);
}

#[test]
fn test_entities_listing() {
    let store = post_store();
    let ids: Vec<&str> = store.entities().collect();
    assert_eq!(ids, vec!["post:1", "post:2", "post:3"]);
}

#[test]
fn test_links() {
    let mut store = FactStore::new();
    store.add_links(vec![
        Link::new("post:1", "author", "person:1"),
        Link::new("post:2", "author", "person:1"),
        Link::new("post:1", "cites", "post:2"),
    ]);

    assert_eq!(store.links_by_entity("post:1").len(), 2);
    assert_eq!(store.links_by_relation("author").len(), 2);
    assert_eq!(store.links_by_entity_relation("post:1", "cites")[0].target, "post:2");
    assert_eq!(store.links_to("person:1").len(), 2);
    assert_eq!(store.links_to_relation("post:2", "cites")[0].source, "post:1");
    assert!(store.links_to_relation("post:2", "author").is_empty());
    assert_eq!(store.stats().link_count, 3);
}

#[test]
fn test_stats() {
    let store = post_store();
    let stats = store.stats();
    assert_eq!(stats.entity_count, 3);
    // type, id, views, tags, title
    assert_eq!(stats.attribute_count, 5);
    assert_eq!(stats.catalog_size, 5);
    assert_eq!(stats.fact_count, store.facts().len());
    assert!(!store.is_empty());
}

// ============================================================================
// Ingestion
// ============================================================================

#[test]
fn test_ingest_root_scalar() {
    let facts = ingest(&json!(42), "n:1", "n");
    assert_eq!(facts.len(), 2);
    assert_eq!(facts[1].attribute, "value");
    assert_eq!(facts[1].value, Atom::Num(42.0));
}

#[test]
fn test_ingest_skips_nulls() {
    let facts = ingest(&json!({"a": null, "b": [null, 1]}), "x:1", "x");
    let attrs: Vec<&str> = facts.iter().map(|f| f.attribute.as_str()).collect();
    assert_eq!(attrs, vec!["type", "b"]);
}

#[test]
fn test_ingest_array_of_objects_interleaves() {
    let facts = ingest(
        &json!({"authors": [{"name": "a", "age": 1}, {"name": "b"}]}),
        "book:1",
        "book",
    );
    let names: Vec<&Atom> = facts
        .iter()
        .filter(|f| f.attribute == "authors.name")
        .map(|f| &f.value)
        .collect();
    assert_eq!(names, vec![&Atom::from("a"), &Atom::from("b")]);
    assert_eq!(facts.iter().filter(|f| f.attribute == "authors.age").count(), 1);
}

#[test]
fn test_ingest_collection_ids() {
    let facts = ingest_collection(
        &json!([{"slug": "hello"}, {"title": "no slug"}]),
        "post",
        "slug",
        IngestOptions::default(),
    );
    assert_eq!(facts[0].entity, "post:hello");
    assert!(facts.iter().any(|f| f.entity == "post:#1"));
    assert_eq!(entity_id("post", "7"), "post:7");
}

#[test]
fn test_ingest_detects_dates_when_asked() {
    let value = json!({"published": "2024-03-01", "title": "x"});
    let plain = ingest(&value, "post:1", "post");
    assert_eq!(plain[1].value, Atom::from("2024-03-01"));

    let dated = ingest_with(&value, "post:1", "post", IngestOptions { detect_dates: true });
    assert!(matches!(dated[1].value, Atom::Date(_)));
    assert_eq!(dated[2].value, Atom::from("x"));
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn test_catalog_types_and_range() {
    let store = post_store();
    let views = store.catalog_entry("views").unwrap();
    assert_eq!(views.value_type, ValueType::Number);
    assert_eq!(views.cardinality, Cardinality::One);
    assert_eq!(views.distinct_count, 3);
    assert_eq!(views.min, Some(800.0));
    assert_eq!(views.max, Some(2000.0));

    let tags = store.catalog_entry("tags").unwrap();
    assert_eq!(tags.cardinality, Cardinality::Many);
    assert_eq!(tags.value_type, ValueType::String);
}

#[test]
fn test_catalog_widening_is_sticky() {
    let mut store = FactStore::new();
    store.add_facts(vec![Fact::new("a:1", "size", 3i64)]);
    store.add_facts(vec![Fact::new("a:2", "size", "large")]);
    assert_eq!(store.catalog_entry("size").unwrap().value_type, ValueType::Mixed);

    for i in 0..5 {
        store.add_facts(vec![Fact::new(format!("b:{}", i), "size", i as i64)]);
        assert_eq!(store.catalog_entry("size").unwrap().value_type, ValueType::Mixed);
    }
}

#[test]
fn test_catalog_examples_are_capped() {
    let mut store = FactStore::new();
    store.add_facts((0..20).map(|i| Fact::new(format!("a:{}", i), "n", i as i64)));
    let entry = store.catalog_entry("n").unwrap();
    assert_eq!(entry.examples.len(), 5);
    assert_eq!(entry.distinct_count, 20);
}

#[test]
fn test_catalog_serializes_for_discovery() {
    let store = post_store();
    let json = serde_json::to_value(store.catalog_entry("views").unwrap()).unwrap();
    assert_eq!(json["attribute"], "views");
    assert_eq!(json["type"], "number");
    assert_eq!(json["cardinality"], "one");
    assert_eq!(json["distinctCount"], 3);
    assert_eq!(json["examples"], json!([1500, 2000, 800]));

    let title = serde_json::to_value(store.catalog_entry("title").unwrap()).unwrap();
    assert!(title.get("min").is_none());
}
