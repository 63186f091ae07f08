//! Scalar values carried by facts.
//!
//! An [`Atom`] is a tagged union rather than a stringly-typed value, so the
//! value index can key on [`Atom::canonical_key`] without `"1"` and `1`
//! colliding.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Str(String),
    Num(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    /// Reference to another entity, by id (`"<type>:<id>"`)
    Ref(String),
}

impl Atom {
    /// One-letter type tag used in canonical keys.
    pub fn tag(&self) -> char {
        match self {
            Atom::Str(_) => 's',
            Atom::Num(_) => 'n',
            Atom::Bool(_) => 'b',
            Atom::Date(_) => 'd',
            Atom::Ref(_) => 'r',
        }
    }

    /// Index key: type tag plus normalized text.
    pub fn canonical_key(&self) -> String {
        format!("{}:{}", self.tag(), self.as_text())
    }

    /// Plain text rendering (no quotes), used for substring and regex tests.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Atom::Str(s) | Atom::Ref(s) => Cow::Borrowed(s),
            Atom::Num(n) => Cow::Owned(format_number(*n)),
            Atom::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Atom::Date(d) => Cow::Owned(d.to_rfc3339()),
        }
    }

    /// Numeric view: numbers as-is, dates as epoch milliseconds.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Atom::Num(n) => Some(*n),
            Atom::Date(d) => Some(d.timestamp_millis() as f64),
            _ => None,
        }
    }

    /// The entity id this atom names, if it is textual.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Atom::Str(s) | Atom::Ref(s) => Some(s),
            _ => None,
        }
    }

    /// Unification equality.
    ///
    /// Strings and entity references compare by text, numbers numerically.
    /// A date equals a string that parses to the same instant. Everything
    /// else must agree on the type tag.
    pub fn unifies_with(&self, other: &Atom) -> bool {
        match (self, other) {
            (Atom::Str(a) | Atom::Ref(a), Atom::Str(b) | Atom::Ref(b)) => a == b,
            (Atom::Num(a), Atom::Num(b)) => a == b,
            (Atom::Bool(a), Atom::Bool(b)) => a == b,
            (Atom::Date(a), Atom::Date(b)) => a == b,
            (Atom::Date(d), Atom::Str(s)) | (Atom::Str(s), Atom::Date(d)) => parse_date(s) == Some(*d),
            _ => false,
        }
    }

    /// Other atoms that unify with this one but live under a different
    /// index key.
    ///
    /// For a date these are its RFC 3339 text and, at midnight UTC, its
    /// `YYYY-MM-DD` form; other spellings of the same instant are not found
    /// through the value index.
    pub fn twins(&self) -> Vec<Atom> {
        match self {
            Atom::Str(s) => {
                let mut twins = vec![Atom::Ref(s.clone())];
                twins.extend(parse_date(s).map(Atom::Date));
                twins
            }
            Atom::Ref(s) => vec![Atom::Str(s.clone())],
            Atom::Date(d) => {
                let mut twins = vec![Atom::Str(d.to_rfc3339())];
                if d.num_seconds_from_midnight() == 0 && d.nanosecond() == 0 {
                    twins.push(Atom::Str(d.format("%Y-%m-%d").to_string()));
                }
                twins
            }
            Atom::Num(_) | Atom::Bool(_) => Vec::new(),
        }
    }

    /// Convert a JSON scalar. Returns `None` for null, arrays and objects.
    pub fn from_json(value: &Value, detect_dates: bool) -> Option<Atom> {
        match value {
            Value::String(s) => {
                if detect_dates {
                    if let Some(d) = parse_date(s) {
                        return Some(Atom::Date(d));
                    }
                }
                Some(Atom::Str(s.clone()))
            }
            Value::Number(n) => n.as_f64().map(Atom::Num),
            Value::Bool(b) => Some(Atom::Bool(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Atom::Str(s) | Atom::Ref(s) => Value::String(s.clone()),
            Atom::Num(n) => number_to_json(*n),
            Atom::Bool(b) => Value::Bool(*b),
            Atom::Date(d) => Value::String(d.to_rfc3339()),
        }
    }

    /// Total order used by `ORDER BY`.
    ///
    /// Booleans sort first, then numbers and dates (by numeric value), then
    /// strings and references (lexicographically).
    pub fn total_cmp(&self, other: &Atom) -> Ordering {
        fn rank(a: &Atom) -> u8 {
            match a {
                Atom::Bool(_) => 0,
                Atom::Num(_) | Atom::Date(_) => 1,
                Atom::Str(_) | Atom::Ref(_) => 2,
            }
        }
        match rank(self).cmp(&rank(other)) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (self, other) {
            (Atom::Bool(a), Atom::Bool(b)) => a.cmp(b),
            (Atom::Str(a) | Atom::Ref(a), Atom::Str(b) | Atom::Ref(b)) => a.cmp(b),
            _ => {
                let a = self.as_number().unwrap_or(f64::NAN);
                let b = other.as_number().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
        }
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Render a number without a trailing `.0` for integral values.
fn format_number(n: f64) -> String {
    // Collapse -0 so it shares an index key with 0
    let n = if n == 0.0 { 0.0 } else { n };
    n.to_string()
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Str(s) | Atom::Ref(s) => write!(f, "{:?}", s),
            Atom::Num(n) => write!(f, "{}", format_number(*n)),
            Atom::Bool(b) => write!(f, "{}", b),
            Atom::Date(d) => write!(f, "{:?}", d.to_rfc3339()),
        }
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::Str(s.to_string())
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Atom::Str(s)
    }
}

impl From<f64> for Atom {
    fn from(n: f64) -> Self {
        Atom::Num(n)
    }
}

impl From<i64> for Atom {
    fn from(n: i64) -> Self {
        Atom::Num(n as f64)
    }
}

impl From<bool> for Atom {
    fn from(b: bool) -> Self {
        Atom::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_keys_disambiguate_types() {
        assert_ne!(Atom::from("1").canonical_key(), Atom::from(1i64).canonical_key());
        assert_ne!(Atom::from("true").canonical_key(), Atom::Bool(true).canonical_key());
        assert_eq!(Atom::Num(1500.0).canonical_key(), "n:1500");
        assert_eq!(Atom::Num(-0.0).canonical_key(), Atom::Num(0.0).canonical_key());
    }

    #[test]
    fn refs_unify_with_strings_by_text() {
        let r = Atom::Ref("user:1".into());
        assert!(r.unifies_with(&Atom::from("user:1")));
        assert!(!r.unifies_with(&Atom::from("user:2")));
        assert!(!Atom::from("1").unifies_with(&Atom::from(1i64)));
    }

    #[test]
    fn dates_unify_with_date_strings() {
        let d = Atom::Date(parse_date("2024-05-01").unwrap());
        assert!(d.unifies_with(&Atom::from("2024-05-01")));
        assert!(Atom::from("2024-05-01T00:00:00Z").unifies_with(&d));
        assert!(!d.unifies_with(&Atom::from("2024-05-02")));
        assert!(!d.unifies_with(&Atom::Ref("2024-05-01".into())));
    }

    #[test]
    fn twins_cover_other_index_keys() {
        let d = Atom::Date(parse_date("2024-05-01").unwrap());
        assert_eq!(
            d.twins(),
            vec![Atom::from("2024-05-01T00:00:00+00:00"), Atom::from("2024-05-01")]
        );
        assert_eq!(
            Atom::from("2024-05-01").twins(),
            vec![Atom::Ref("2024-05-01".into()), d]
        );
        assert!(Atom::Num(1.0).twins().is_empty());
    }

    #[test]
    fn parses_dates() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01T10:00:00Z").is_some());
        assert!(parse_date("March 1st").is_none());
    }

    #[test]
    fn total_order_ranks_types() {
        let mut atoms = vec![Atom::from("b"), Atom::Num(2.0), Atom::Bool(true), Atom::from("a"), Atom::Num(-1.0)];
        atoms.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            atoms,
            vec![Atom::Bool(true), Atom::Num(-1.0), Atom::Num(2.0), Atom::from("a"), Atom::from("b")]
        );
    }

    #[test]
    fn integral_numbers_serialize_as_integers() {
        assert_eq!(Atom::Num(3.0).to_json(), serde_json::json!(3));
        assert_eq!(Atom::Num(2.5).to_json(), serde_json::json!(2.5));
    }
}
