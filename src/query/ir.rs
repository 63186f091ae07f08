//! Goal-list query representation.
//!
//! This is what every surface syntax compiles to, and the only thing the
//! evaluator understands:
//!
//! ```text
//! attr(?p, "type", "post"), attr(?p, "views", ?p.views), gt(?p.views, 1000)
//! ```
//!
//! A [`Query`] is an ordered conjunction of [`Goal`]s plus the set of
//! variables the caller wants back.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use crate::atom::Atom;

/// One solution: variable name → value, in binding order.
pub type Binding = IndexMap<String, Atom>;

/// A goal argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Variable name, without the leading `?`
    Var(String),
    Const(Atom),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn constant(value: impl Into<Atom>) -> Self {
        Term::Const(value.into())
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Term::Var(v) => Some(v),
            Term::Const(_) => None,
        }
    }

    /// The term's value under a binding, if it has one.
    pub fn resolve<'a>(&'a self, binding: &'a Binding) -> Option<&'a Atom> {
        match self {
            Term::Var(v) => binding.get(v),
            Term::Const(c) => Some(c),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "?{}", v),
            Term::Const(c) => write!(f, "{}", c),
        }
    }
}

/// A predicate application.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub predicate: String,
    pub terms: Vec<Term>,
    /// Left-outer semantics: a binding with no solutions passes through
    /// unchanged instead of being dropped.
    pub optional: bool,
}

impl Goal {
    pub fn new(predicate: impl Into<String>, terms: Vec<Term>) -> Self {
        Self {
            predicate: predicate.into(),
            terms,
            optional: false,
        }
    }

    /// `attr(entity, attribute, value)`
    pub fn attr(entity: Term, attribute: &str, value: Term) -> Self {
        Self::new("attr", vec![entity, Term::constant(attribute), value])
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Variables in argument order, without repeats.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::new();
        self.terms
            .iter()
            .filter_map(Term::as_var)
            .filter(move |v| seen.insert(*v))
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "optional ")?;
        }
        write!(f, "{}(", self.predicate)?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", term)?;
        }
        write!(f, ")")
    }
}

/// A derived predicate: `head :- body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub head: Goal,
    pub body: Vec<Goal>,
}

impl Rule {
    pub fn new(head: Goal, body: Vec<Goal>) -> Self {
        Self { head, body }
    }

    pub fn name(&self) -> &str {
        &self.head.predicate
    }

    pub fn arity(&self) -> usize {
        self.head.terms.len()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :- ", self.head)?;
        for (i, goal) in self.body.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", goal)?;
        }
        Ok(())
    }
}

/// A compiled request: goals in evaluation order and the output variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub goals: Vec<Goal>,
    pub outputs: Vec<String>,
}

impl Query {
    pub fn new(goals: Vec<Goal>, outputs: Vec<String>) -> Self {
        Self { goals, outputs }
    }

    /// A query returning every variable, in first-appearance order.
    pub fn all_variables(goals: Vec<Goal>) -> Self {
        let mut outputs: Vec<String> = Vec::new();
        for goal in &goals {
            for v in goal.variables() {
                if !outputs.iter().any(|o| o == v) {
                    outputs.push(v.to_string());
                }
            }
        }
        Self { goals, outputs }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, goal) in self.goals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", goal)?;
        }
        Ok(())
    }
}
