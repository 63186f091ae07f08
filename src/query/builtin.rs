//! Built-in predicates.
//!
//! Built-ins form a closed set. Goals naming anything else are looked up in
//! the evaluator's rule table.

use std::fmt;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `attr(E, A, V)`: fact lookup
    Attr,
    /// `link(E1, R, E2)`: link lookup
    Link,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `between(V, lo, hi)`, inclusive
    Between,
    /// `contains(S, sub)`, case-sensitive
    Contains,
    /// `matches(S, pattern[, flags])`, also spelled `regex`
    Matches,
    /// Recognized only so it can be rejected
    Not,
}

impl Builtin {
    pub const ALL: [Builtin; 12] = [
        Builtin::Attr,
        Builtin::Link,
        Builtin::Eq,
        Builtin::Neq,
        Builtin::Gt,
        Builtin::Gte,
        Builtin::Lt,
        Builtin::Lte,
        Builtin::Between,
        Builtin::Contains,
        Builtin::Matches,
        Builtin::Not,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "attr" => Builtin::Attr,
            "link" => Builtin::Link,
            "eq" => Builtin::Eq,
            "neq" => Builtin::Neq,
            "gt" => Builtin::Gt,
            "gte" => Builtin::Gte,
            "lt" => Builtin::Lt,
            "lte" => Builtin::Lte,
            "between" => Builtin::Between,
            "contains" => Builtin::Contains,
            "matches" | "regex" => Builtin::Matches,
            "not" => Builtin::Not,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Attr => "attr",
            Builtin::Link => "link",
            Builtin::Eq => "eq",
            Builtin::Neq => "neq",
            Builtin::Gt => "gt",
            Builtin::Gte => "gte",
            Builtin::Lt => "lt",
            Builtin::Lte => "lte",
            Builtin::Between => "between",
            Builtin::Contains => "contains",
            Builtin::Matches => "matches",
            Builtin::Not => "not",
        }
    }

    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            Builtin::Attr | Builtin::Link | Builtin::Between => 3..=3,
            Builtin::Matches => 2..=3,
            Builtin::Not => 1..=usize::MAX,
            _ => 2..=2,
        }
    }

    /// Pure filters never bind variables.
    pub fn is_filter(self) -> bool {
        !matches!(self, Builtin::Attr | Builtin::Link | Builtin::Not)
    }

    /// Numeric comparison, for the four ordering filters.
    pub fn compare(self, a: f64, b: f64) -> bool {
        match self {
            Builtin::Gt => a > b,
            Builtin::Gte => a >= b,
            Builtin::Lt => a < b,
            Builtin::Lte => a <= b,
            _ => false,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for b in Builtin::ALL {
            assert_eq!(Builtin::from_name(b.name()), Some(b));
        }
        assert_eq!(Builtin::from_name("regex"), Some(Builtin::Matches));
        assert_eq!(Builtin::from_name("popular"), None);
    }
}
