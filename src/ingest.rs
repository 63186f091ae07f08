//! JSON ingestion.
//!
//! Flattens an arbitrary JSON value into facts about one entity:
//!
//! - object keys are joined into dot paths (`{"a": {"b": 1}}` → `a.b = 1`)
//! - array elements are flattened under the *same* path as the array, so
//!   `{"tags": ["x", "y"]}` yields two `tags` facts
//! - `null` leaves produce nothing
//! - a root-level scalar is recorded under [`ROOT_ATTRIBUTE`]
//!
//! Arrays have no positional identity. An array of objects interleaves the
//! fields of every element under identical attribute names, so
//! `{"authors": [{"name": "a"}, {"name": "b"}]}` produces two
//! `authors.name` facts with no record of which element each came from.
//!
//! Every entity starts with a synthetic `type` fact carrying the caller's
//! type label. Nothing here touches a store; callers hand the facts to
//! [`FactStore::add_facts`](crate::store::FactStore::add_facts).

use std::collections::HashSet;

use serde_json::Value;

use crate::atom::Atom;
use crate::store::Fact;

/// Attribute holding the caller-supplied type label.
pub const TYPE_ATTRIBUTE: &str = "type";

/// Attribute used when the ingested value itself is a scalar.
pub const ROOT_ATTRIBUTE: &str = "value";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Turn RFC 3339 and `YYYY-MM-DD` strings into date atoms
    pub detect_dates: bool,
}

/// Entity id convention: `"<type>:<local id>"`.
pub fn entity_id(type_label: &str, local_id: &str) -> String {
    format!("{}:{}", type_label, local_id)
}

/// Flatten `value` into facts about `entity`.
pub fn ingest(value: &Value, entity: &str, type_label: &str) -> Vec<Fact> {
    ingest_with(value, entity, type_label, IngestOptions::default())
}

pub fn ingest_with(value: &Value, entity: &str, type_label: &str, options: IngestOptions) -> Vec<Fact> {
    let mut facts = vec![Fact::new(entity, TYPE_ATTRIBUTE, type_label)];
    flatten(value, "", entity, options, &mut facts);

    // A record's own `type` key may repeat the label; one fact per type
    let mut types = HashSet::new();
    facts.retain(|f| f.attribute != TYPE_ATTRIBUTE || types.insert(f.value.canonical_key()));
    tracing::trace!(entity, facts = facts.len(), "flattened entity");
    facts
}

/// Ingest a record or array of records, deriving entity ids from `id_field`.
///
/// Records without a scalar `id_field` fall back to `#<position>` in the
/// array, so they never merge with a record whose explicit id is that
/// number. Non-object array elements are ingested the same way as objects.
pub fn ingest_collection(records: &Value, type_label: &str, id_field: &str, options: IngestOptions) -> Vec<Fact> {
    let items: Vec<&Value> = match records {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let explicit: Vec<Option<String>> = items
        .iter()
        .map(|record| {
            record
                .get(id_field)
                .and_then(|v| Atom::from_json(v, false))
                .map(|a| a.as_text().into_owned())
        })
        .collect();
    let taken: HashSet<&str> = explicit.iter().flatten().map(String::as_str).collect();

    let mut facts = Vec::new();
    for (position, (record, local)) in items.iter().zip(&explicit).enumerate() {
        let local = match local {
            Some(id) => id.clone(),
            None => fallback_id(position, &taken),
        };
        facts.extend(ingest_with(record, &entity_id(type_label, &local), type_label, options));
    }
    tracing::debug!(type_label, facts = facts.len(), "ingested collection");
    facts
}

fn fallback_id(position: usize, taken: &HashSet<&str>) -> String {
    let mut id = format!("#{}", position);
    while taken.contains(id.as_str()) {
        id.insert(0, '#');
    }
    id
}

fn flatten(value: &Value, path: &str, entity: &str, options: IngestOptions, out: &mut Vec<Fact>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten(child, &child_path, entity, options, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten(item, path, entity, options, out);
            }
        }
        scalar => {
            if let Some(atom) = Atom::from_json(scalar, options.detect_dates) {
                let attribute = if path.is_empty() { ROOT_ATTRIBUTE } else { path };
                out.push(Fact::new(entity, attribute, atom));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(facts: &[Fact]) -> Vec<(String, Atom)> {
        facts.iter().map(|f| (f.attribute.clone(), f.value.clone())).collect()
    }

    #[test]
    fn type_fact_comes_first() {
        let facts = ingest(&json!({"title": "Hello"}), "post:1", "post");
        assert_eq!(
            pairs(&facts),
            vec![
                ("type".to_string(), Atom::from("post")),
                ("title".to_string(), Atom::from("Hello")),
            ]
        );
        assert!(facts.iter().all(|f| f.entity == "post:1"));
    }

    #[test]
    fn nested_objects_and_arrays() {
        let value = json!({
            "meta": {"author": {"name": "ada"}},
            "tags": ["a", "b"],
            "comments": [{"by": "x"}, {"by": "y", "likes": 3}],
            "deleted": null
        });
        let facts = ingest(&value, "post:1", "post");
        assert_eq!(
            pairs(&facts[1..]),
            vec![
                ("meta.author.name".to_string(), Atom::from("ada")),
                ("tags".to_string(), Atom::from("a")),
                ("tags".to_string(), Atom::from("b")),
                ("comments.by".to_string(), Atom::from("x")),
                ("comments.by".to_string(), Atom::from("y")),
                ("comments.likes".to_string(), Atom::Num(3.0)),
            ]
        );
    }

    #[test]
    fn root_scalars_and_arrays() {
        let facts = ingest(&json!([1, 2]), "n:1", "n");
        assert_eq!(
            pairs(&facts[1..]),
            vec![
                ("value".to_string(), Atom::Num(1.0)),
                ("value".to_string(), Atom::Num(2.0)),
            ]
        );
    }

    #[test]
    fn collection_ids_from_field_or_position() {
        let records = json!([{"id": 7, "a": 1}, {"a": 2}]);
        let facts = ingest_collection(&records, "row", "id", IngestOptions::default());
        let entities: Vec<_> = facts.iter().map(|f| f.entity.as_str()).collect();
        assert_eq!(entities, vec!["row:7", "row:7", "row:7", "row:#1", "row:#1"]);
    }

    #[test]
    fn fallback_ids_avoid_explicit_ones() {
        let records = json!([{"id": 1, "a": 1}, {"a": 2}, {"id": "#3"}, {"a": 3}]);
        let facts = ingest_collection(&records, "row", "id", IngestOptions::default());
        let mut entities: Vec<_> = facts.iter().map(|f| f.entity.as_str()).collect();
        entities.dedup();
        assert_eq!(entities, vec!["row:1", "row:#1", "row:#3", "row:##3"]);
    }

    #[test]
    fn own_type_key_does_not_repeat_the_label() {
        let facts = ingest(&json!({"type": "post", "views": 5}), "post:1", "post");
        assert_eq!(facts.iter().filter(|f| f.attribute == "type").count(), 1);

        // A different value is kept as a second type
        let facts = ingest(&json!({"type": "draft"}), "post:1", "post");
        assert_eq!(
            pairs(&facts),
            vec![
                ("type".to_string(), Atom::from("post")),
                ("type".to_string(), Atom::from("draft")),
            ]
        );
    }

    #[test]
    fn date_detection_is_opt_in() {
        let value = json!({"published": "2024-05-01"});
        let plain = ingest(&value, "post:1", "post");
        assert!(matches!(plain[1].value, Atom::Str(_)));
        let dated = ingest_with(&value, "post:1", "post", IngestOptions { detect_dates: true });
        assert!(matches!(dated[1].value, Atom::Date(_)));
    }
}
