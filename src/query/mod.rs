//! Datalog query layer.
//!
//! - [`ir`]: goals, rules and queries, the target of every surface syntax
//! - [`builtin`]: the closed set of built-in predicates
//! - [`eval`]: nested-loop evaluation against a [`crate::store::FactStore`]
//! - [`post`]: ordering, limiting and projecting raw bindings into rows

pub mod builtin;
pub mod eval;
pub mod ir;
pub mod post;

pub use builtin::Builtin;
pub use eval::{build_regex, Access, EvalResult, Evaluator, PlanStep};
pub use ir::{Binding, Goal, Query, Rule, Term};
pub use post::{Row, Shape, Shaped, SortKey};
