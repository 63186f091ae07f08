//! Append-only EAV fact store.
//!
//! Facts are `(entity, attribute, value)` triples; links are explicit
//! `(source, relation, target)` edges between entities. Neither is ever
//! mutated or removed once added.
//!
//! # Indexes
//!
//! Every fact gets a stable insertion index and is recorded in three indexes:
//!
//! - entity → attribute → fact indices
//! - attribute → entity → fact indices
//! - attribute → canonical value key → fact indices
//!
//! Links are indexed forward (source → relation), in reverse
//! (target → relation) and by relation alone. All indexes are
//! [`IndexMap`]s holding ascending index lists, so iteration follows
//! insertion order and repeated reads are deterministic.
//!
//! The [`catalog`] is maintained in the same pass as the fact indexes.

use indexmap::IndexMap;
use serde::Serialize;

use crate::atom::Atom;

pub mod catalog;

pub use catalog::{CatalogEntry, Cardinality, ValueType};

/// One `(entity, attribute, value)` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact {
    pub entity: String,
    pub attribute: String,
    pub value: Atom,
}

impl Fact {
    pub fn new(entity: impl Into<String>, attribute: impl Into<String>, value: impl Into<Atom>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// A directed, named edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    pub source: String,
    pub relation: String,
    pub target: String,
}

impl Link {
    pub fn new(source: impl Into<String>, relation: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            relation: relation.into(),
            target: target.into(),
        }
    }
}

/// Aggregate counters over the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub fact_count: usize,
    pub link_count: usize,
    pub entity_count: usize,
    pub attribute_count: usize,
    pub catalog_size: usize,
}

type Nested = IndexMap<String, IndexMap<String, Vec<usize>>>;

/// The fact store.
#[derive(Debug, Default, Clone)]
pub struct FactStore {
    facts: Vec<Fact>,
    links: Vec<Link>,

    by_entity: Nested,
    by_attribute: Nested,
    by_value: Nested,

    links_forward: Nested,
    links_reverse: Nested,
    links_by_relation: IndexMap<String, Vec<usize>>,

    catalog: IndexMap<String, CatalogEntry>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append facts, updating every index and the catalog.
    ///
    /// Duplicates are kept: adding the same fact twice doubles its
    /// multiplicity in query results.
    pub fn add_facts<I>(&mut self, facts: I)
    where
        I: IntoIterator<Item = Fact>,
    {
        let start = self.facts.len();
        for fact in facts {
            self.insert_fact(fact);
        }
        tracing::debug!(
            added = self.facts.len() - start,
            total = self.facts.len(),
            "facts added"
        );
    }

    fn insert_fact(&mut self, fact: Fact) {
        let idx = self.facts.len();

        push(&mut self.by_entity, &fact.entity, &fact.attribute, idx);
        let multiplicity = push(&mut self.by_attribute, &fact.attribute, &fact.entity, idx);
        push(&mut self.by_value, &fact.attribute, &fact.value.canonical_key(), idx);

        match self.catalog.get_mut(&fact.attribute) {
            Some(slot) => {
                let previous = std::mem::take(slot);
                *slot = catalog::observe(Some(previous), &fact, multiplicity);
            }
            None => {
                let entry = catalog::observe(None, &fact, multiplicity);
                self.catalog.insert(fact.attribute.clone(), entry);
            }
        }

        self.facts.push(fact);
    }

    /// Append links, updating the forward, reverse and relation indexes.
    pub fn add_links<I>(&mut self, links: I)
    where
        I: IntoIterator<Item = Link>,
    {
        let start = self.links.len();
        for link in links {
            let idx = self.links.len();
            push(&mut self.links_forward, &link.source, &link.relation, idx);
            push(&mut self.links_reverse, &link.target, &link.relation, idx);
            self.links_by_relation
                .entry(link.relation.clone())
                .or_default()
                .push(idx);
            self.links.push(link);
        }
        tracing::debug!(
            added = self.links.len() - start,
            total = self.links.len(),
            "links added"
        );
    }

    // ========================================================================
    // Facts
    // ========================================================================

    /// All facts in insertion order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn fact(&self, idx: usize) -> Option<&Fact> {
        self.facts.get(idx)
    }

    /// Facts about an entity, grouped by attribute in first-seen order.
    pub fn facts_by_entity(&self, entity: &str) -> Vec<&Fact> {
        self.by_entity
            .get(entity)
            .map(|attrs| self.merged(attrs.values()))
            .unwrap_or_default()
    }

    pub fn facts_by_entity_attribute(&self, entity: &str, attribute: &str) -> Vec<&Fact> {
        self.by_entity
            .get(entity)
            .and_then(|attrs| attrs.get(attribute))
            .map(|idxs| self.resolve(idxs))
            .unwrap_or_default()
    }

    /// Facts carrying an attribute, in insertion order.
    pub fn facts_by_attribute(&self, attribute: &str) -> Vec<&Fact> {
        self.by_attribute
            .get(attribute)
            .map(|ents| self.merged(ents.values()))
            .unwrap_or_default()
    }

    /// Facts whose attribute and value match exactly (same type tag).
    pub fn facts_by_value(&self, attribute: &str, value: &Atom) -> Vec<&Fact> {
        self.by_value
            .get(attribute)
            .and_then(|vals| vals.get(&value.canonical_key()))
            .map(|idxs| self.resolve(idxs))
            .unwrap_or_default()
    }

    /// Distinct entity ids in first-seen order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.by_entity.keys().map(String::as_str)
    }

    // ========================================================================
    // Links
    // ========================================================================

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Outgoing links of an entity.
    pub fn links_by_entity(&self, source: &str) -> Vec<&Link> {
        self.links_forward
            .get(source)
            .map(|rels| self.merged_links(rels.values()))
            .unwrap_or_default()
    }

    pub fn links_by_relation(&self, relation: &str) -> Vec<&Link> {
        self.links_by_relation
            .get(relation)
            .map(|idxs| idxs.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    pub fn links_by_entity_relation(&self, source: &str, relation: &str) -> Vec<&Link> {
        self.links_forward
            .get(source)
            .and_then(|rels| rels.get(relation))
            .map(|idxs| idxs.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    /// Incoming links of an entity.
    pub fn links_to(&self, target: &str) -> Vec<&Link> {
        self.links_reverse
            .get(target)
            .map(|rels| self.merged_links(rels.values()))
            .unwrap_or_default()
    }

    pub fn links_to_relation(&self, target: &str, relation: &str) -> Vec<&Link> {
        self.links_reverse
            .get(target)
            .and_then(|rels| rels.get(relation))
            .map(|idxs| idxs.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Catalog and stats
    // ========================================================================

    /// Catalog entries in the order attributes were first seen.
    pub fn catalog(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.catalog.values()
    }

    pub fn catalog_entry(&self, attribute: &str) -> Option<&CatalogEntry> {
        self.catalog.get(attribute)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            fact_count: self.facts.len(),
            link_count: self.links.len(),
            entity_count: self.by_entity.len(),
            attribute_count: self.by_attribute.len(),
            catalog_size: self.catalog.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.links.is_empty()
    }

    fn resolve(&self, idxs: &[usize]) -> Vec<&Fact> {
        idxs.iter().map(|&i| &self.facts[i]).collect()
    }

    /// Merge several ascending index buckets back into insertion order.
    fn merged<'a>(&self, buckets: impl Iterator<Item = &'a Vec<usize>>) -> Vec<&Fact> {
        let mut idxs: Vec<usize> = buckets.flatten().copied().collect();
        idxs.sort_unstable();
        self.resolve(&idxs)
    }

    fn merged_links<'a>(&self, buckets: impl Iterator<Item = &'a Vec<usize>>) -> Vec<&Link> {
        let mut idxs: Vec<usize> = buckets.flatten().copied().collect();
        idxs.sort_unstable();
        idxs.into_iter().map(|i| &self.links[i]).collect()
    }
}

/// Record `idx` under `outer → inner`, returning the bucket's new length.
fn push(index: &mut Nested, outer: &str, inner: &str, idx: usize) -> usize {
    let bucket = index
        .entry(outer.to_string())
        .or_default()
        .entry(inner.to_string())
        .or_default();
    bucket.push(idx);
    bucket.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FactStore {
        let mut store = FactStore::new();
        store.add_facts(vec![
            Fact::new("post:1", "type", "post"),
            Fact::new("post:1", "views", 1500i64),
            Fact::new("post:2", "type", "post"),
            Fact::new("post:2", "views", "1500"),
            Fact::new("post:1", "tags", "rust"),
        ]);
        store
    }

    #[test]
    fn entity_lookup_is_insertion_ordered() {
        let store = sample();
        let attrs: Vec<_> = store
            .facts_by_entity("post:1")
            .iter()
            .map(|f| f.attribute.as_str())
            .collect();
        assert_eq!(attrs, vec!["type", "views", "tags"]);
    }

    #[test]
    fn value_lookup_respects_type_tag() {
        let store = sample();
        let numeric = store.facts_by_value("views", &Atom::Num(1500.0));
        assert_eq!(numeric.len(), 1);
        assert_eq!(numeric[0].entity, "post:1");
        let text = store.facts_by_value("views", &Atom::from("1500"));
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].entity, "post:2");
    }

    #[test]
    fn stats_count_unique_entities_and_attributes() {
        let mut store = sample();
        store.add_links(vec![Link::new("post:1", "author", "user:1")]);
        let stats = store.stats();
        assert_eq!(stats.fact_count, 5);
        assert_eq!(stats.link_count, 1);
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.attribute_count, 3);
        assert_eq!(stats.catalog_size, 3);
    }

    #[test]
    fn links_are_indexed_both_ways() {
        let mut store = FactStore::new();
        store.add_links(vec![
            Link::new("post:1", "author", "user:1"),
            Link::new("post:2", "author", "user:1"),
            Link::new("post:1", "cites", "post:2"),
        ]);
        assert_eq!(store.links_by_entity("post:1").len(), 2);
        assert_eq!(store.links_by_entity_relation("post:1", "cites")[0].target, "post:2");
        assert_eq!(store.links_to("user:1").len(), 2);
        assert_eq!(store.links_to_relation("post:2", "cites")[0].source, "post:1");
        assert_eq!(store.links_by_relation("author").len(), 2);
    }

    #[test]
    fn catalog_tracks_mixed_types() {
        let store = sample();
        let views = store.catalog_entry("views").unwrap();
        assert_eq!(views.value_type, ValueType::Mixed);
        assert_eq!(views.distinct_count, 2);
    }
}
