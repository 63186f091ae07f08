//! EQL-S compiler: surface AST → goal list.
//!
//! # Lowering
//!
//! - `FIND post AS ?p` → `attr(?p, "type", "post")`
//! - `?p.status = "draft"` → `attr(?p, "status", "draft")`, answered from
//!   the value index
//! - any other condition on `?p.views` → `attr(?p, "views", ?p.views)`
//!   followed by the filter built-in. Each distinct `(variable, path)` pair
//!   gets one internal variable, named by the path expression. User
//!   variables cannot contain `.`, so the names never collide.
//! - `RETURN` and `ORDER BY` paths the conditions did not bind become
//!   *optional* attr goals at the end, so an entity missing the attribute
//!   still appears with a `null` column.
//!
//! Compilation never fails with an `Err`: [`Compiled`] carries either a
//! query or the list of problems found.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::ast::{
    AttrRef, CompareOp, Condition, FindQuery, Literal, Operand, Projection, RawGoal, Span,
    Statement, TermExpr,
};
use crate::atom::Atom;
use crate::error::ParseError;
use crate::ingest::TYPE_ATTRIBUTE;
use crate::query::{Goal, Query, Rule, Shape, SortKey, Term};
use crate::store::CatalogEntry;

/// A compiled query plus what post-processing needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: Query,
    pub shape: Shape,
}

impl CompiledQuery {
    /// Result column → internal variable, in `RETURN` order.
    pub fn projection(&self) -> &IndexMap<String, String> {
        &self.shape.columns
    }
}

/// Outcome of [`Processor::compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub query: Option<CompiledQuery>,
    pub errors: Vec<ParseError>,
}

impl Compiled {
    fn failed(errors: Vec<ParseError>) -> Self {
        Self { query: None, errors }
    }

    pub fn is_ok(&self) -> bool {
        self.query.is_some()
    }
}

/// Known attribute paths, for case-insensitive resolution.
#[derive(Debug, Clone, Default)]
struct Schema {
    exact: HashSet<String>,
    folded: HashMap<String, String>,
}

impl Schema {
    fn resolve(&self, path: &str) -> Option<String> {
        if path == TYPE_ATTRIBUTE || self.exact.contains(path) {
            return Some(path.to_string());
        }
        self.folded.get(&path.to_lowercase()).cloned()
    }
}

/// Turns query text into evaluator input.
#[derive(Debug, Clone, Default)]
pub struct Processor {
    schema: Option<Schema>,
}

impl Processor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check attribute paths against the catalog from now on.
    ///
    /// Paths resolve case-insensitively to the catalog's spelling; paths the
    /// catalog has never seen are semantic errors.
    pub fn set_schema<'a>(&mut self, catalog: impl IntoIterator<Item = &'a CatalogEntry>) {
        let mut schema = Schema::default();
        for entry in catalog {
            schema.exact.insert(entry.attribute.clone());
            schema
                .folded
                .entry(entry.attribute.to_lowercase())
                .or_insert_with(|| entry.attribute.clone());
        }
        self.schema = Some(schema);
    }

    pub fn clear_schema(&mut self) {
        self.schema = None;
    }

    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    pub fn compile(&self, source: &str) -> Compiled {
        let statement = match crate::parse(source) {
            Ok(statement) => statement,
            Err(errors) => {
                tracing::debug!(errors = errors.len(), "query failed to parse");
                return Compiled::failed(errors);
            }
        };

        let mut lowering = Lowering::new(source, self.schema.as_ref());
        let compiled = match statement {
            Statement::Find(find) => lowering.find(&find),
            Statement::Goals(goals) => lowering.goal_list(&goals),
        };

        if !lowering.errors.is_empty() {
            tracing::debug!(errors = lowering.errors.len(), "query rejected");
            return Compiled::failed(lowering.errors);
        }
        tracing::debug!(query = %compiled.query, "query compiled");
        Compiled {
            query: Some(compiled),
            errors: Vec::new(),
        }
    }

    /// Compile `head(?x, ...) :- goal, goal` into a [`Rule`].
    pub fn compile_rule(&self, source: &str) -> Result<Rule, Vec<ParseError>> {
        let def = crate::parse_rule(source)?;
        let mut lowering = Lowering::new(source, self.schema.as_ref());
        let head = lowering.raw_goal(&def.head);
        let body: Vec<Goal> = def.body.iter().map(|g| lowering.raw_goal(g)).collect();
        if !lowering.errors.is_empty() {
            return Err(lowering.errors);
        }
        Ok(Rule::new(head, body))
    }
}

/// Per-query lowering state.
struct Lowering<'a> {
    source: &'a str,
    schema: Option<&'a Schema>,
    goals: Vec<Goal>,
    /// User variables with a binding site
    bound: HashSet<String>,
    /// (variable, canonical path) → internal variable
    attrs: HashMap<(String, String), String>,
    errors: Vec<ParseError>,
}

impl<'a> Lowering<'a> {
    fn new(source: &'a str, schema: Option<&'a Schema>) -> Self {
        Self {
            source,
            schema,
            goals: Vec::new(),
            bound: HashSet::new(),
            attrs: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn error(&mut self, span: &Span, message: String) {
        self.errors
            .push(ParseError::semantic(self.source, span.clone(), message));
    }

    fn find(&mut self, find: &FindQuery) -> CompiledQuery {
        for binding in &find.bindings {
            if !self.bound.insert(binding.var.clone()) {
                self.error(&binding.span, format!("variable ?{} is bound twice", binding.var));
                continue;
            }
            self.goals.push(Goal::attr(
                Term::var(&binding.var),
                TYPE_ATTRIBUTE,
                Term::constant(binding.type_name.as_str()),
            ));
        }

        // Raw goals bind their variables wherever they appear
        for condition in &find.conditions {
            if let Condition::Goal(raw) = condition {
                for arg in &raw.args {
                    if let TermExpr::Var(v) = arg {
                        self.bound.insert(v.clone());
                    }
                }
            }
        }

        for condition in &find.conditions {
            self.condition(condition);
        }

        let mut columns = IndexMap::new();
        for projection in &find.returns {
            if let Some(var) = self.projection(projection) {
                columns.insert(projection.to_string(), var);
            }
        }

        let order_by = find.order_by.as_ref().and_then(|order| {
            self.projection(&order.key).map(|var| SortKey {
                var,
                descending: order.descending,
            })
        });

        let mut outputs: Vec<String> = Vec::new();
        for var in columns.values().chain(order_by.iter().map(|k| &k.var)) {
            if !outputs.contains(var) {
                outputs.push(var.clone());
            }
        }

        CompiledQuery {
            query: Query::new(std::mem::take(&mut self.goals), outputs),
            shape: Shape {
                columns,
                order_by,
                limit: find.limit,
            },
        }
    }

    fn goal_list(&mut self, raw: &[RawGoal]) -> CompiledQuery {
        let goals: Vec<Goal> = raw.iter().map(|g| self.raw_goal(g)).collect();
        let query = Query::all_variables(goals);
        let shape = Shape::identity(&query.outputs);
        CompiledQuery { query, shape }
    }

    fn condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Compare {
                attr,
                op: CompareOp::Eq,
                rhs: Operand::Lit(lit),
            } => {
                if !self.check_bound(&attr.var, &attr.span) {
                    return;
                }
                if let Some(path) = self.resolve_path(attr) {
                    self.goals
                        .push(Goal::attr(Term::var(&attr.var), &path, Term::Const(atom(lit))));
                }
            }
            Condition::Compare { attr, op, rhs } => {
                let lhs = self.attr_var(attr, false);
                let rhs = match rhs {
                    Operand::Lit(lit) => Some(Term::Const(atom(lit))),
                    Operand::Var(v, span) => self.check_bound(v, span).then(|| Term::var(v)),
                    Operand::Attr(other) => self.attr_var(other, false).map(Term::Var),
                };
                if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                    let predicate = match op {
                        CompareOp::Eq => "eq",
                        CompareOp::NotEq => "neq",
                        CompareOp::Gt => "gt",
                        CompareOp::Gte => "gte",
                        CompareOp::Lt => "lt",
                        CompareOp::Lte => "lte",
                    };
                    self.goals.push(Goal::new(predicate, vec![Term::Var(lhs), rhs]));
                }
            }
            Condition::Between { attr, lo, hi } => {
                if let Some(v) = self.attr_var(attr, false) {
                    self.goals.push(Goal::new(
                        "between",
                        vec![Term::Var(v), Term::Const(atom(lo)), Term::Const(atom(hi))],
                    ));
                }
            }
            Condition::Contains { attr, needle } => {
                if let Some(v) = self.attr_var(attr, false) {
                    self.goals.push(Goal::new(
                        "contains",
                        vec![Term::Var(v), Term::constant(needle.as_str())],
                    ));
                }
            }
            Condition::Matches {
                attr,
                pattern,
                flags,
            } => {
                if let Some(v) = self.attr_var(attr, false) {
                    let mut terms = vec![Term::Var(v), Term::constant(pattern.as_str())];
                    if !flags.is_empty() {
                        terms.push(Term::constant(flags.as_str()));
                    }
                    self.goals.push(Goal::new("matches", terms));
                }
            }
            Condition::Goal(raw) => {
                let goal = self.raw_goal(raw);
                self.goals.push(goal);
            }
        }
    }

    /// Variable holding a projected value, adding an optional lookup if the
    /// conditions never fetched it.
    fn projection(&mut self, projection: &Projection) -> Option<String> {
        match projection {
            Projection::Var(v, span) => self.check_bound(v, span).then(|| v.clone()),
            Projection::Attr(attr) => self.attr_var(attr, true),
        }
    }

    fn attr_var(&mut self, attr: &AttrRef, optional: bool) -> Option<String> {
        if !self.check_bound(&attr.var, &attr.span) {
            return None;
        }
        let path = self.resolve_path(attr)?;
        let key = (attr.var.clone(), path.clone());
        if let Some(existing) = self.attrs.get(&key) {
            return Some(existing.clone());
        }

        let internal = format!("{}.{}", attr.var, path);
        let goal = Goal::attr(Term::var(&attr.var), &path, Term::var(&internal));
        self.goals.push(if optional { goal.optional() } else { goal });
        self.attrs.insert(key, internal.clone());
        Some(internal)
    }

    fn check_bound(&mut self, var: &str, span: &Span) -> bool {
        if self.bound.contains(var) {
            return true;
        }
        self.error(span, format!("unbound variable ?{}", var));
        false
    }

    fn resolve_path(&mut self, attr: &AttrRef) -> Option<String> {
        let path = attr.path_string();
        let Some(schema) = self.schema else {
            return Some(path);
        };
        match schema.resolve(&path) {
            Some(canonical) => Some(canonical),
            None => {
                self.error(&attr.span, format!("unknown attribute '{}'", path));
                None
            }
        }
    }

    fn raw_goal(&mut self, raw: &RawGoal) -> Goal {
        let mut terms = Vec::with_capacity(raw.args.len());
        for arg in &raw.args {
            match arg {
                TermExpr::Var(v) => terms.push(Term::var(v)),
                TermExpr::Lit(lit) => terms.push(Term::Const(atom(lit))),
                TermExpr::Regex { pattern, flags } => {
                    terms.push(Term::constant(pattern.as_str()));
                    if !flags.is_empty() {
                        terms.push(Term::constant(flags.as_str()));
                    }
                }
            }
        }

        // Constant attribute names are checked like path expressions
        if raw.name == "attr" {
            if let (Some(schema), Some(Term::Const(Atom::Str(name)))) = (self.schema, terms.get(1)) {
                match schema.resolve(name) {
                    Some(canonical) => terms[1] = Term::Const(Atom::Str(canonical)),
                    None => {
                        let message = format!("unknown attribute '{}'", name);
                        self.error(&raw.span, message);
                    }
                }
            }
        }

        Goal::new(raw.name.clone(), terms)
    }
}

fn atom(lit: &Literal) -> Atom {
    match lit {
        Literal::Str(s) => Atom::Str(s.clone()),
        Literal::Num(n) => Atom::Num(*n),
        Literal::Bool(b) => Atom::Bool(*b),
    }
}
