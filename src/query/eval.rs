//! Query evaluation against a [`FactStore`].
//!
//! Evaluation is an ordered nested-loop join. Starting from a single empty
//! binding, each goal extends every partial binding with the solutions
//! consistent with what that binding already fixes; shared variable names
//! across goals enforce equality. Goals run in the order written, so the
//! caller's goal order is the join order.
//!
//! # Predicates
//!
//! Built-ins come from the closed [`Builtin`] enum. Any other name is looked
//! up in the rule table. Rule solutions are computed by evaluating the rule
//! body once per [`Evaluator::evaluate`] call and unifying each solution with
//! the calling goal.
//!
//! # Failure
//!
//! Every goal is checked before any data is touched: unknown predicates,
//! wrong arity, malformed literals and negation are errors even when the
//! store is empty. Filters that meet unbound or non-numeric *data* simply
//! produce no solutions.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};

use crate::atom::{parse_date, Atom};
use crate::error::{EvalError, RuleError};
use crate::store::{Fact, FactStore, Link};

use super::builtin::Builtin;
use super::ir::{Binding, Goal, Query, Rule, Term};

/// Outcome of a successful evaluation.
#[derive(Debug, Clone)]
pub struct EvalResult {
    /// Solutions restricted to the query's output variables
    pub bindings: Vec<Binding>,
    pub execution_time: Duration,
    /// Join order and access path per goal, when requested
    pub plan: Option<Vec<PlanStep>>,
}

/// How a goal reached its candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    EntityAttribute,
    Entity,
    AttributeValue,
    Attribute,
    FactScan,
    LinkForward,
    LinkReverse,
    LinkRelation,
    LinkScan,
    Filter,
    Rule,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Access::EntityAttribute => "entity+attribute index",
            Access::Entity => "entity index",
            Access::AttributeValue => "attribute+value index",
            Access::Attribute => "attribute index",
            Access::FactScan => "full fact scan",
            Access::LinkForward => "forward link index",
            Access::LinkReverse => "reverse link index",
            Access::LinkRelation => "relation index",
            Access::LinkScan => "full link scan",
            Access::Filter => "filter",
            Access::Rule => "derived",
        };
        write!(f, "{}", s)
    }
}

/// One line of a query plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub goal: String,
    pub access: Access,
    /// Partial bindings after this goal
    pub rows: usize,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] -> {} rows", self.goal, self.access, self.rows)
    }
}

#[derive(Debug, Clone, Copy)]
enum Resolved<'r> {
    Builtin(Builtin),
    Rule(&'r Rule),
}

/// A goal whose predicate has been looked up and checked.
struct Prepared<'g> {
    goal: &'g Goal,
    kind: Resolved<'g>,
}

/// Per-evaluation scratch state.
struct Ctx<'s> {
    store: &'s FactStore,
    regexes: HashMap<(String, String), Regex>,
    rule_cache: HashMap<String, Rc<Vec<Vec<Atom>>>>,
}

impl<'s> Ctx<'s> {
    fn new(store: &'s FactStore) -> Self {
        Self {
            store,
            regexes: HashMap::new(),
            rule_cache: HashMap::new(),
        }
    }

    fn regex(&mut self, pattern: &str, flags: &str) -> Result<&Regex, EvalError> {
        match self.regexes.entry((pattern.to_string(), flags.to_string())) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => Ok(e.insert(build_regex(pattern, flags)?)),
        }
    }
}

/// The Datalog evaluator: built-ins plus a table of registered rules.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    rules: IndexMap<String, Rule>,
    max_bindings: Option<usize>,
    explain: bool,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`EvalError::BindingLimit`] once more than `limit`
    /// partial bindings are alive after any goal.
    pub fn with_max_bindings(mut self, limit: Option<usize>) -> Self {
        self.max_bindings = limit;
        self
    }

    /// Record a [`PlanStep`] per goal on every evaluation.
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Registered rules, in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Register a derived predicate.
    ///
    /// Rules may only refer to built-ins and to rules registered before
    /// them, so rule references form a DAG and evaluation always
    /// terminates.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), RuleError> {
        let name = rule.name().to_string();

        if Builtin::from_name(&name).is_some() {
            return Err(RuleError::ShadowsBuiltin(name));
        }
        if self.rules.contains_key(&name) {
            return Err(RuleError::Duplicate(name));
        }
        if rule.body.is_empty() {
            return Err(RuleError::EmptyBody(name));
        }

        for goal in &rule.body {
            match Builtin::from_name(&goal.predicate) {
                Some(Builtin::Not) => return Err(RuleError::Negation(name)),
                Some(_) => {}
                None if self.rules.contains_key(&goal.predicate) => {}
                None => {
                    return Err(RuleError::UnknownPredicate {
                        rule: name,
                        predicate: goal.predicate.clone(),
                    })
                }
            }
        }

        if let Err(source) = self.prepare(&rule.body) {
            return Err(RuleError::Body { rule: name, source });
        }

        let body_vars: HashSet<&str> = rule.body.iter().flat_map(Goal::variables).collect();
        if let Some(var) = rule.head.variables().find(|v| !body_vars.contains(v)) {
            return Err(RuleError::UnboundHeadVariable {
                rule: name,
                var: var.to_string(),
            });
        }

        tracing::debug!(rule = %rule, "rule registered");
        self.rules.insert(name, rule);
        Ok(())
    }

    /// Evaluate a query.
    pub fn evaluate(&self, store: &FactStore, query: &Query) -> Result<EvalResult, EvalError> {
        self.run(store, query, self.explain)
    }

    /// Evaluate a query and always record the plan.
    pub fn explain(&self, store: &FactStore, query: &Query) -> Result<EvalResult, EvalError> {
        self.run(store, query, true)
    }

    fn run(&self, store: &FactStore, query: &Query, explain: bool) -> Result<EvalResult, EvalError> {
        let span = tracing::debug_span!("evaluate", goals = query.goals.len());
        let _guard = span.enter();
        let started = Instant::now();

        let prepared = self.prepare(&query.goals)?;
        let mut ctx = Ctx::new(store);
        let mut plan = explain.then(Vec::new);
        let solutions = self.solve(&mut ctx, &prepared, plan.as_mut())?;

        let bindings: Vec<Binding> = solutions
            .into_iter()
            .map(|b| restrict(b, &query.outputs))
            .collect();

        let execution_time = started.elapsed();
        tracing::debug!(rows = bindings.len(), elapsed = ?execution_time, "query evaluated");
        Ok(EvalResult {
            bindings,
            execution_time,
            plan,
        })
    }

    /// Resolve and check every goal up front.
    fn prepare<'g>(&'g self, goals: &'g [Goal]) -> Result<Vec<Prepared<'g>>, EvalError> {
        let prepared = goals
            .iter()
            .map(|goal| {
                let kind = match Builtin::from_name(&goal.predicate) {
                    Some(Builtin::Not) => {
                        return Err(EvalError::Unsupported("negation (not) is not implemented".to_string()))
                    }
                    Some(builtin) => {
                        check_arity(&goal.predicate, goal.terms.len(), &builtin.arity())?;
                        check_literals(builtin, goal)?;
                        Resolved::Builtin(builtin)
                    }
                    None => {
                        let rule = self
                            .rules
                            .get(&goal.predicate)
                            .ok_or_else(|| EvalError::UnknownPredicate(goal.predicate.clone()))?;
                        let arity = rule.arity();
                        check_arity(&goal.predicate, goal.terms.len(), &(arity..=arity))?;
                        Resolved::Rule(rule)
                    }
                };
                Ok(Prepared { goal, kind })
            })
            .collect::<Result<Vec<_>, _>>()?;
        check_bindable(&prepared)?;
        Ok(prepared)
    }

    fn solve(
        &self,
        ctx: &mut Ctx<'_>,
        goals: &[Prepared<'_>],
        mut plan: Option<&mut Vec<PlanStep>>,
    ) -> Result<Vec<Binding>, EvalError> {
        let mut frontier = vec![Binding::new()];
        let mut bound: HashSet<&str> = HashSet::new();

        for prepared in goals {
            let goal = prepared.goal;
            let mut next = Vec::new();

            for binding in &frontier {
                let before = next.len();
                self.solve_goal(ctx, prepared, binding, &mut next)?;
                if goal.optional && next.len() == before {
                    next.push(binding.clone());
                }
                if let Some(limit) = self.max_bindings {
                    if next.len() > limit {
                        return Err(EvalError::BindingLimit(limit));
                    }
                }
            }

            tracing::trace!(goal = %goal, rows = next.len(), "goal solved");
            if let Some(plan) = plan.as_deref_mut() {
                plan.push(PlanStep {
                    goal: goal.to_string(),
                    access: access_path(prepared, &bound),
                    rows: next.len(),
                });
            }
            bound.extend(goal.variables());
            frontier = next;
        }

        Ok(frontier)
    }

    fn solve_goal(
        &self,
        ctx: &mut Ctx<'_>,
        prepared: &Prepared<'_>,
        binding: &Binding,
        out: &mut Vec<Binding>,
    ) -> Result<(), EvalError> {
        let terms = &prepared.goal.terms;
        let builtin = match prepared.kind {
            Resolved::Builtin(b) => b,
            Resolved::Rule(rule) => {
                let tuples = self.rule_solutions(ctx, rule)?;
                for tuple in tuples.iter() {
                    let mut b = binding.clone();
                    if terms.iter().zip(tuple).all(|(t, v)| unify(&mut b, t, v)) {
                        out.push(b);
                    }
                }
                return Ok(());
            }
        };

        match builtin {
            Builtin::Attr => solve_attr(ctx.store, terms, binding, out),
            Builtin::Link => solve_link(ctx.store, terms, binding, out),
            Builtin::Eq => {
                let (a, b) = (&terms[0], &terms[1]);
                match (a.resolve(binding), b.resolve(binding)) {
                    (Some(x), Some(y)) => {
                        if x.unifies_with(y) {
                            out.push(binding.clone());
                        }
                    }
                    (Some(x), None) | (None, Some(x)) => {
                        // One side unbound: equality binds it
                        let mut next = binding.clone();
                        if unify(&mut next, a, x) && unify(&mut next, b, x) {
                            out.push(next);
                        }
                    }
                    (None, None) => {}
                }
            }
            Builtin::Neq => {
                if let (Some(x), Some(y)) = (terms[0].resolve(binding), terms[1].resolve(binding)) {
                    if !x.unifies_with(y) {
                        out.push(binding.clone());
                    }
                }
            }
            Builtin::Gt | Builtin::Gte | Builtin::Lt | Builtin::Lte => {
                let a = terms[0].resolve(binding).and_then(numeric);
                let b = terms[1].resolve(binding).and_then(numeric);
                if let (Some(a), Some(b)) = (a, b) {
                    if builtin.compare(a, b) {
                        out.push(binding.clone());
                    }
                }
            }
            Builtin::Between => {
                let v = terms[0].resolve(binding).and_then(numeric);
                let lo = terms[1].resolve(binding).and_then(numeric);
                let hi = terms[2].resolve(binding).and_then(numeric);
                if let (Some(v), Some(lo), Some(hi)) = (v, lo, hi) {
                    if lo <= v && v <= hi {
                        out.push(binding.clone());
                    }
                }
            }
            Builtin::Contains => {
                if let (Some(s), Some(sub)) = (terms[0].resolve(binding), terms[1].resolve(binding)) {
                    if s.as_text().contains(sub.as_text().as_ref()) {
                        out.push(binding.clone());
                    }
                }
            }
            Builtin::Matches => {
                let subject = terms[0].resolve(binding);
                let pattern = terms[1].resolve(binding);
                let flags = match terms.get(2) {
                    Some(t) => t.resolve(binding).map(|f| f.as_text().into_owned()),
                    None => Some(String::new()),
                };
                if let (Some(subject), Some(pattern), Some(flags)) = (subject, pattern, flags) {
                    let re = ctx.regex(&pattern.as_text(), &flags)?;
                    if re.is_match(&subject.as_text()) {
                        out.push(binding.clone());
                    }
                }
            }
            Builtin::Not => {
                return Err(EvalError::Unsupported("negation (not) is not implemented".to_string()))
            }
        }
        Ok(())
    }

    /// Head tuples of a rule, computed once per evaluation.
    fn rule_solutions(&self, ctx: &mut Ctx<'_>, rule: &Rule) -> Result<Rc<Vec<Vec<Atom>>>, EvalError> {
        if let Some(cached) = ctx.rule_cache.get(rule.name()) {
            return Ok(Rc::clone(cached));
        }

        let body = self.prepare(&rule.body)?;
        let bindings = self.solve(ctx, &body, None)?;
        let tuples: Vec<Vec<Atom>> = bindings
            .iter()
            .filter_map(|b| {
                rule.head
                    .terms
                    .iter()
                    .map(|t| t.resolve(b).cloned())
                    .collect::<Option<Vec<_>>>()
            })
            .collect();

        tracing::trace!(rule = rule.name(), tuples = tuples.len(), "rule materialized");
        let tuples = Rc::new(tuples);
        ctx.rule_cache
            .insert(rule.name().to_string(), Rc::clone(&tuples));
        Ok(tuples)
    }
}

// ============================================================================
// Fact and link lookups
// ============================================================================

fn text(atom: Option<&Atom>) -> Result<Option<&str>, ()> {
    match atom {
        None => Ok(None),
        Some(a) => a.entity_id().map(Some).ok_or(()),
    }
}

fn solve_attr(store: &FactStore, terms: &[Term], binding: &Binding, out: &mut Vec<Binding>) {
    // A non-textual entity or attribute can never match
    let (Ok(entity), Ok(attribute)) = (
        text(terms[0].resolve(binding)),
        text(terms[1].resolve(binding)),
    ) else {
        return;
    };
    let value = terms[2].resolve(binding);

    let candidates: Vec<&Fact> = match (entity, attribute, value) {
        (Some(e), Some(a), _) => store.facts_by_entity_attribute(e, a),
        (Some(e), None, _) => store.facts_by_entity(e),
        (None, Some(a), Some(v)) => {
            let mut facts = store.facts_by_value(a, v);
            // Each twin has its own key, so the lookups never overlap
            for twin in v.twins() {
                facts.extend(store.facts_by_value(a, &twin));
            }
            facts
        }
        (None, Some(a), None) => store.facts_by_attribute(a),
        (None, None, _) => store.facts().iter().collect(),
    };

    for fact in candidates {
        let mut b = binding.clone();
        if unify(&mut b, &terms[0], &Atom::Ref(fact.entity.clone()))
            && unify(&mut b, &terms[1], &Atom::Str(fact.attribute.clone()))
            && unify(&mut b, &terms[2], &fact.value)
        {
            out.push(b);
        }
    }
}

fn solve_link(store: &FactStore, terms: &[Term], binding: &Binding, out: &mut Vec<Binding>) {
    let (Ok(source), Ok(relation), Ok(target)) = (
        text(terms[0].resolve(binding)),
        text(terms[1].resolve(binding)),
        text(terms[2].resolve(binding)),
    ) else {
        return;
    };

    let candidates: Vec<&Link> = match (source, relation, target) {
        (Some(s), Some(r), _) => store.links_by_entity_relation(s, r),
        (Some(s), None, _) => store.links_by_entity(s),
        (None, Some(r), Some(t)) => store.links_to_relation(t, r),
        (None, None, Some(t)) => store.links_to(t),
        (None, Some(r), None) => store.links_by_relation(r),
        (None, None, None) => store.links().iter().collect(),
    };

    for link in candidates {
        let mut b = binding.clone();
        if unify(&mut b, &terms[0], &Atom::Ref(link.source.clone()))
            && unify(&mut b, &terms[1], &Atom::Str(link.relation.clone()))
            && unify(&mut b, &terms[2], &Atom::Ref(link.target.clone()))
        {
            out.push(b);
        }
    }
}

/// Bind or check one term against a value.
fn unify(binding: &mut Binding, term: &Term, value: &Atom) -> bool {
    match term {
        Term::Const(c) => c.unifies_with(value),
        Term::Var(v) => match binding.get(v) {
            Some(existing) => existing.unifies_with(value),
            None => {
                binding.insert(v.clone(), value.clone());
                true
            }
        },
    }
}

/// Keep only the output variables, in output order.
fn restrict(mut binding: Binding, outputs: &[String]) -> Binding {
    outputs
        .iter()
        .filter_map(|v| binding.swap_remove(v).map(|a| (v.clone(), a)))
        .collect()
}

// ============================================================================
// Literal checks
// ============================================================================

/// Numeric view for comparisons: numbers, dates, and date-shaped strings.
fn numeric(atom: &Atom) -> Option<f64> {
    atom.as_number().or_else(|| match atom {
        Atom::Str(s) => parse_date(s).map(|d| d.timestamp_millis() as f64),
        _ => None,
    })
}

fn check_arity(predicate: &str, found: usize, arity: &std::ops::RangeInclusive<usize>) -> Result<(), EvalError> {
    if arity.contains(&found) {
        return Ok(());
    }
    let expected = if arity.start() == arity.end() {
        arity.start().to_string()
    } else {
        format!("{} to {}", arity.start(), arity.end())
    };
    Err(EvalError::Arity {
        predicate: predicate.to_string(),
        expected,
        found,
    })
}

fn check_literals(builtin: Builtin, goal: &Goal) -> Result<(), EvalError> {
    let invalid = |message: String| EvalError::InvalidArgument {
        predicate: goal.predicate.clone(),
        message,
    };
    let constant = |i: usize| match goal.terms.get(i) {
        Some(Term::Const(c)) => Some(c),
        _ => None,
    };

    match builtin {
        Builtin::Attr | Builtin::Link => {
            if let Some(c) = constant(1) {
                if c.entity_id().is_none() {
                    return Err(invalid(format!("name must be a string, found {}", c)));
                }
            }
        }
        Builtin::Gt | Builtin::Gte | Builtin::Lt | Builtin::Lte | Builtin::Between => {
            for i in 0..goal.terms.len() {
                if let Some(c) = constant(i) {
                    if numeric(c).is_none() {
                        return Err(invalid(format!("expected a number or date, found {}", c)));
                    }
                }
            }
        }
        Builtin::Matches => {
            if let Some(pattern) = constant(1) {
                let flags = constant(2).map(|f| f.as_text().into_owned()).unwrap_or_default();
                build_regex(&pattern.as_text(), &flags)?;
            }
        }
        Builtin::Eq | Builtin::Neq | Builtin::Contains | Builtin::Not => {}
    }
    Ok(())
}

fn binds(kind: Resolved<'_>) -> bool {
    match kind {
        Resolved::Rule(_) => true,
        Resolved::Builtin(b) => !b.is_filter() || b == Builtin::Eq,
    }
}

/// Every variable a filter reads must be mentioned by some binding goal.
fn check_bindable(goals: &[Prepared<'_>]) -> Result<(), EvalError> {
    let binders: HashSet<&str> = goals
        .iter()
        .filter(|p| binds(p.kind))
        .flat_map(|p| p.goal.variables())
        .collect();
    for p in goals.iter().filter(|p| !binds(p.kind)) {
        if let Some(v) = p.goal.variables().find(|v| !binders.contains(v)) {
            return Err(EvalError::UnboundVariable(v.to_string()));
        }
    }
    Ok(())
}

/// Compile a pattern with `/.../flags`-style flags.
///
/// `i`, `m`, `s` and `x` map onto regex options; `g`, `u` and `y` are
/// accepted and ignored since a single match test has no use for them.
pub fn build_regex(pattern: &str, flags: &str) -> Result<Regex, EvalError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'g' | 'u' | 'y' => &mut builder,
            other => {
                return Err(EvalError::InvalidArgument {
                    predicate: "matches".to_string(),
                    message: format!("unknown regex flag '{}'", other),
                })
            }
        };
    }
    builder.build().map_err(|e| EvalError::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Describe the access path a goal takes given the variables bound before it.
fn access_path(prepared: &Prepared<'_>, bound: &HashSet<&str>) -> Access {
    let fixed = |i: usize| match prepared.goal.terms.get(i) {
        Some(Term::Const(_)) => true,
        Some(Term::Var(v)) => bound.contains(v.as_str()),
        None => false,
    };
    match prepared.kind {
        Resolved::Rule(_) => Access::Rule,
        Resolved::Builtin(Builtin::Attr) => match (fixed(0), fixed(1), fixed(2)) {
            (true, true, _) => Access::EntityAttribute,
            (true, false, _) => Access::Entity,
            (false, true, true) => Access::AttributeValue,
            (false, true, false) => Access::Attribute,
            (false, false, _) => Access::FactScan,
        },
        Resolved::Builtin(Builtin::Link) => match (fixed(0), fixed(1), fixed(2)) {
            (true, _, _) => Access::LinkForward,
            (false, _, true) => Access::LinkReverse,
            (false, true, false) => Access::LinkRelation,
            (false, false, false) => Access::LinkScan,
        },
        Resolved::Builtin(_) => Access::Filter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_flags() {
        assert!(build_regex("^a", "i").unwrap().is_match("Abc"));
        assert!(!build_regex("^a", "").unwrap().is_match("Abc"));
        assert!(build_regex("^a", "g").is_ok());
        assert!(matches!(build_regex("^a", "q"), Err(EvalError::InvalidArgument { .. })));
        assert!(matches!(build_regex("(", ""), Err(EvalError::InvalidRegex { .. })));
    }

    #[test]
    fn restrict_keeps_output_order() {
        let mut b = Binding::new();
        b.insert("x".into(), Atom::Num(1.0));
        b.insert("hidden".into(), Atom::Num(2.0));
        b.insert("y".into(), Atom::Num(3.0));
        let r = restrict(b, &["y".to_string(), "x".to_string(), "missing".to_string()]);
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["y", "x"]);
    }

    #[test]
    fn unify_checks_existing_bindings() {
        let mut b = Binding::new();
        assert!(unify(&mut b, &Term::var("x"), &Atom::from("post:1")));
        assert!(unify(&mut b, &Term::var("x"), &Atom::Ref("post:1".into())));
        assert!(!unify(&mut b, &Term::var("x"), &Atom::from("post:2")));
        assert!(unify(&mut b, &Term::constant(5i64), &Atom::Num(5.0)));
    }
}
