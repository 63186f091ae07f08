//! Surface AST for EQL-S
//!
//! All three surface syntaxes (keyword, pipeline, raw goal list) parse into
//! these types; the pipeline form is expressed as a single-binding
//! [`FindQuery`].

use std::fmt;

pub use crate::lexer::Span;

/// A literal value written in a query.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::Num(n) => write!(f, "{}", n),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// `?var.seg.seg`
#[derive(Clone, Debug, PartialEq)]
pub struct AttrRef {
    pub var: String,
    pub path: Vec<String>,
    pub span: Span,
}

impl AttrRef {
    /// Dot-joined attribute path, as written
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}.{}", self.var, self.path_string())
    }
}

/// Argument of a raw predicate call.
#[derive(Clone, Debug, PartialEq)]
pub enum TermExpr {
    Var(String),
    Lit(Literal),
    Regex { pattern: String, flags: String },
}

/// `name(term, ...)`
#[derive(Clone, Debug, PartialEq)]
pub struct RawGoal {
    pub name: String,
    pub args: Vec<TermExpr>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Right-hand side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Lit(Literal),
    Var(String, Span),
    Attr(AttrRef),
}

/// One conjunct of a `WHERE` clause.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Compare {
        attr: AttrRef,
        op: CompareOp,
        rhs: Operand,
    },
    Between {
        attr: AttrRef,
        lo: Literal,
        hi: Literal,
    },
    Contains {
        attr: AttrRef,
        needle: String,
    },
    Matches {
        attr: AttrRef,
        pattern: String,
        flags: String,
    },
    Goal(RawGoal),
}

/// A `RETURN` or `ORDER BY` entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Var(String, Span),
    Attr(AttrRef),
}

impl Projection {
    pub fn span(&self) -> &Span {
        match self {
            Projection::Var(_, span) => span,
            Projection::Attr(attr) => &attr.span,
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Var(v, _) => write!(f, "?{}", v),
            Projection::Attr(attr) => write!(f, "{}", attr),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub key: Projection,
    pub descending: bool,
}

/// `<type> AS ?var`
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub type_name: String,
    pub var: String,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FindQuery {
    pub bindings: Vec<Binding>,
    pub conditions: Vec<Condition>,
    pub returns: Vec<Projection>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

/// A parsed query in any surface syntax.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Find(FindQuery),
    Goals(Vec<RawGoal>),
}

/// `head(?x, ...) :- goal, goal, ...`
#[derive(Clone, Debug, PartialEq)]
pub struct RuleDef {
    pub head: RawGoal,
    pub body: Vec<RawGoal>,
}
