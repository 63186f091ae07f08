//! Result shaping: ordering, limiting and projection of raw bindings.

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::atom::Atom;

use super::ir::Binding;

/// One result row: column name → value, `None` where an optional goal
/// found nothing.
pub type Row = IndexMap<String, Option<Atom>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub var: String,
    pub descending: bool,
}

/// How bindings become rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Shape {
    /// Column name → variable, in column order
    pub columns: IndexMap<String, String>,
    pub order_by: Option<SortKey>,
    pub limit: Option<usize>,
}

/// Rows plus the number of solutions before the limit was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Shaped {
    pub rows: Vec<Row>,
    pub total_count: usize,
}

impl Shape {
    /// Every variable of `outputs` as its own `?name` column.
    pub fn identity(outputs: &[String]) -> Self {
        Self {
            columns: outputs.iter().map(|v| (format!("?{}", v), v.clone())).collect(),
            order_by: None,
            limit: None,
        }
    }

    pub fn apply(&self, mut bindings: Vec<Binding>) -> Shaped {
        if let Some(key) = &self.order_by {
            sort_bindings(&mut bindings, &key.var, key.descending);
        }
        let total_count = bindings.len();
        if let Some(limit) = self.limit {
            bindings.truncate(limit);
        }

        let rows = bindings
            .iter()
            .map(|b| {
                self.columns
                    .iter()
                    .map(|(column, var)| (column.clone(), b.get(var).cloned()))
                    .collect()
            })
            .collect();

        Shaped { rows, total_count }
    }
}

/// Stable sort on one variable. Unbound values go last in either direction.
pub fn sort_bindings(bindings: &mut [Binding], var: &str, descending: bool) {
    bindings.sort_by(|a, b| match (a.get(var), b.get(var)) {
        (Some(x), Some(y)) => {
            let ord = x.total_cmp(y);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(pairs: &[(&str, Atom)]) -> Binding {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn nulls_sort_last_both_ways() {
        let mut rows = vec![
            binding(&[("v", Atom::Num(2.0))]),
            binding(&[]),
            binding(&[("v", Atom::Num(10.0))]),
        ];
        sort_bindings(&mut rows, "v", false);
        assert_eq!(rows[0].get("v"), Some(&Atom::Num(2.0)));
        assert!(rows[2].get("v").is_none());

        sort_bindings(&mut rows, "v", true);
        assert_eq!(rows[0].get("v"), Some(&Atom::Num(10.0)));
        assert!(rows[2].get("v").is_none());
    }

    #[test]
    fn limit_keeps_total_count() {
        let shape = Shape {
            columns: [("?p".to_string(), "p".to_string())].into_iter().collect(),
            order_by: None,
            limit: Some(1),
        };
        let shaped = shape.apply(vec![
            binding(&[("p", Atom::from("post:1"))]),
            binding(&[("p", Atom::from("post:2"))]),
        ]);
        assert_eq!(shaped.total_count, 2);
        assert_eq!(shaped.rows.len(), 1);
        assert_eq!(shaped.rows[0]["?p"], Some(Atom::from("post:1")));
    }
}
