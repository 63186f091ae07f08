//! Parser for EQL-S
//!
//! One token stream, three parse strategies. [`detect_syntax`] looks at the
//! first token to pick the strategy; every strategy yields a [`Statement`],
//! so the compiler has a single lowering path.
//!
//! ```text
//! FIND post AS ?p WHERE ?p.views > 1000 RETURN ?p, ?p.title
//! from post | where ?post.views > 1000 | return ?post.title
//! attr(?p, "views", ?v), gt(?v, 1000)
//! ```

use chumsky::prelude::*;

use crate::ast::*;
use crate::lexer::Token;

/// Surface syntax of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    /// `FIND ... RETURN ...`
    Find,
    /// `from ... | where ... | return ...`
    Pipeline,
    /// `pred(...), pred(...)`
    Goals,
}

/// Pick a parse strategy from the first two tokens.
///
/// A leading `find` or `from` followed by `(` is a predicate call.
pub fn detect_syntax(tokens: &[(Token, Span)]) -> Syntax {
    let mut kinds = tokens.iter().map(|(t, _)| t);
    match (kinds.next(), kinds.next()) {
        (_, Some(Token::LParen)) => Syntax::Goals,
        (Some(Token::Find), _) => Syntax::Find,
        (Some(Token::From), _) => Syntax::Pipeline,
        _ => Syntax::Goals,
    }
}

/// Parser for the given surface syntax.
pub fn statement_parser(syntax: Syntax) -> BoxedParser<'static, Token, Statement, Simple<Token>> {
    match syntax {
        Syntax::Find => find_parser().boxed(),
        Syntax::Pipeline => pipeline_parser().boxed(),
        Syntax::Goals => goals_parser().boxed(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Type names and predicate names. The lexer usually hands keywords in
/// name position over as identifiers already; any that slip through are
/// accepted in their lowercase spelling.
fn name() -> impl Parser<Token, String, Error = Simple<Token>> + Clone {
    filter_map(|span, tok: Token| match tok {
        Token::Ident(s) => Ok(s),
        other => match other.keyword() {
            Some(kw) => Ok(kw.to_string()),
            None => Err(Simple::expected_input_found(span, std::iter::empty(), Some(other))),
        },
    })
    .labelled("name")
}

fn variable() -> impl Parser<Token, String, Error = Simple<Token>> + Clone {
    select! { Token::Var(v) => v }.labelled("variable")
}

fn field() -> impl Parser<Token, String, Error = Simple<Token>> + Clone {
    select! { Token::Field(f) => f }.labelled("attribute")
}

fn string() -> impl Parser<Token, String, Error = Simple<Token>> + Clone {
    select! { Token::Str(s) => s }.labelled("string")
}

fn regex_literal() -> impl Parser<Token, (String, String), Error = Simple<Token>> + Clone {
    select! { Token::Regex { pattern, flags } => (pattern, flags) }.labelled("/pattern/")
}

fn literal() -> impl Parser<Token, Literal, Error = Simple<Token>> + Clone {
    let number = select! { Token::Number(n) => n }.try_map(|n: String, span| {
        n.parse::<f64>()
            .map(Literal::Num)
            .map_err(|_| Simple::custom(span, format!("invalid number '{}'", n)))
    });

    choice((
        string().map(Literal::Str),
        number,
        just(Token::True).to(Literal::Bool(true)),
        just(Token::False).to(Literal::Bool(false)),
    ))
    .labelled("literal")
}

/// `?var.seg.seg` (at least one segment)
fn attr_ref() -> impl Parser<Token, AttrRef, Error = Simple<Token>> + Clone {
    variable()
        .then(field().repeated().at_least(1))
        .map_with_span(|(var, path), span| AttrRef { var, path, span })
}

fn term() -> impl Parser<Token, TermExpr, Error = Simple<Token>> + Clone {
    choice((
        variable().map(TermExpr::Var),
        literal().map(TermExpr::Lit),
        regex_literal().map(|(pattern, flags)| TermExpr::Regex { pattern, flags }),
    ))
    .labelled("term")
}

/// `name(term, ...)`
fn raw_goal() -> impl Parser<Token, RawGoal, Error = Simple<Token>> + Clone {
    name()
        .then(
            term()
                .separated_by(just(Token::Comma))
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map_with_span(|(name, args), span| RawGoal { name, args, span })
}

// ============================================================================
// Conditions
// ============================================================================

fn compare_op() -> impl Parser<Token, CompareOp, Error = Simple<Token>> + Clone {
    select! {
        Token::Eq => CompareOp::Eq,
        Token::NotEq => CompareOp::NotEq,
        Token::Gt => CompareOp::Gt,
        Token::Gte => CompareOp::Gte,
        Token::Lt => CompareOp::Lt,
        Token::Lte => CompareOp::Lte,
    }
    .labelled("comparison operator")
}

fn operand() -> impl Parser<Token, Operand, Error = Simple<Token>> + Clone {
    choice((
        attr_ref().map(Operand::Attr),
        variable().map_with_span(Operand::Var),
        literal().map(Operand::Lit),
    ))
}

/// Whatever follows the attribute reference in a comparison.
enum Tail {
    Compare(CompareOp, Operand),
    Between(Literal, Literal),
    Contains(String),
    Matches(String, String),
}

fn condition() -> impl Parser<Token, Condition, Error = Simple<Token>> + Clone {
    let tail = choice((
        just(Token::Between)
            .ignore_then(literal())
            .then_ignore(just(Token::And))
            .then(literal())
            .map(|(lo, hi)| Tail::Between(lo, hi)),
        just(Token::Contains).ignore_then(string()).map(Tail::Contains),
        just(Token::Matches)
            .ignore_then(regex_literal().or(string().map(|s| (s, String::new()))))
            .map(|(pattern, flags)| Tail::Matches(pattern, flags)),
        compare_op()
            .then(operand())
            .map(|(op, rhs)| Tail::Compare(op, rhs)),
    ));

    let attr_condition = attr_ref().then(tail).map(|(attr, tail)| match tail {
        Tail::Compare(op, rhs) => Condition::Compare { attr, op, rhs },
        Tail::Between(lo, hi) => Condition::Between { attr, lo, hi },
        Tail::Contains(needle) => Condition::Contains { attr, needle },
        Tail::Matches(pattern, flags) => Condition::Matches { attr, pattern, flags },
    });

    choice((raw_goal().map(Condition::Goal), attr_condition))
}

fn conditions() -> impl Parser<Token, Vec<Condition>, Error = Simple<Token>> + Clone {
    condition().separated_by(just(Token::And)).at_least(1)
}

// ============================================================================
// Projections
// ============================================================================

fn projection() -> impl Parser<Token, Projection, Error = Simple<Token>> + Clone {
    choice((
        attr_ref().map(Projection::Attr),
        variable().map_with_span(Projection::Var),
    ))
}

fn projections() -> impl Parser<Token, Vec<Projection>, Error = Simple<Token>> + Clone {
    projection().separated_by(just(Token::Comma)).at_least(1)
}

fn order_by() -> impl Parser<Token, OrderBy, Error = Simple<Token>> + Clone {
    just(Token::Order)
        .ignore_then(just(Token::By))
        .ignore_then(projection())
        .then(choice((just(Token::Asc).to(false), just(Token::Desc).to(true))).or_not())
        .map(|(key, descending)| OrderBy {
            key,
            descending: descending.unwrap_or(false),
        })
}

fn limit() -> impl Parser<Token, usize, Error = Simple<Token>> + Clone {
    just(Token::Limit)
        .ignore_then(select! { Token::Number(n) => n })
        .try_map(|n: String, span| {
            n.parse::<usize>().map_err(|_| {
                Simple::custom(span, format!("LIMIT expects a non-negative integer, found '{}'", n))
            })
        })
}

// ============================================================================
// Statements
// ============================================================================

/// `FIND t AS ?v, ... [WHERE ...] RETURN ... [ORDER BY ...] [LIMIT n]`
pub fn find_parser() -> impl Parser<Token, Statement, Error = Simple<Token>> + Clone {
    let binding = name()
        .then_ignore(just(Token::As))
        .then(variable())
        .map_with_span(|(type_name, var), span| Binding { type_name, var, span });

    just(Token::Find)
        .ignore_then(binding.separated_by(just(Token::Comma)).at_least(1))
        .then(just(Token::Where).ignore_then(conditions()).or_not())
        .then_ignore(just(Token::Return))
        .then(projections())
        .then(order_by().or_not())
        .then(limit().or_not())
        .then_ignore(end())
        .map(|((((bindings, conditions), returns), order_by), limit)| {
            Statement::Find(FindQuery {
                bindings,
                conditions: conditions.unwrap_or_default(),
                returns,
                order_by,
                limit,
            })
        })
}

/// `from t [as ?v] (| where ...)* | return ... [| order by ...] [| limit n]`
///
/// Without `as`, the entity variable is named after the type.
pub fn pipeline_parser() -> impl Parser<Token, Statement, Error = Simple<Token>> + Clone {
    let source = just(Token::From)
        .ignore_then(name())
        .then(just(Token::As).ignore_then(variable()).or_not())
        .map_with_span(|(type_name, var), span| {
            let var = var.unwrap_or_else(|| type_name.clone());
            Binding { type_name, var, span }
        });

    let where_stage = just(Token::Pipe)
        .ignore_then(just(Token::Where))
        .ignore_then(conditions());

    source
        .then(where_stage.repeated())
        .then_ignore(just(Token::Pipe))
        .then_ignore(just(Token::Return))
        .then(projections())
        .then(just(Token::Pipe).ignore_then(order_by()).or_not())
        .then(just(Token::Pipe).ignore_then(limit()).or_not())
        .then_ignore(end())
        .map(|((((binding, wheres), returns), order_by), limit)| {
            Statement::Find(FindQuery {
                bindings: vec![binding],
                conditions: wheres.into_iter().flatten().collect(),
                returns,
                order_by,
                limit,
            })
        })
}

/// `pred(...), pred(...)`
pub fn goals_parser() -> impl Parser<Token, Statement, Error = Simple<Token>> + Clone {
    raw_goal()
        .separated_by(just(Token::Comma).or(just(Token::And)))
        .at_least(1)
        .then_ignore(end())
        .map(Statement::Goals)
}

/// `head(?x, ...) :- pred(...), pred(...)`
pub fn rule_parser() -> impl Parser<Token, RuleDef, Error = Simple<Token>> + Clone {
    raw_goal()
        .then_ignore(just(Token::Implies))
        .then(raw_goal().separated_by(just(Token::Comma)).at_least(1))
        .then_ignore(end())
        .map(|(head, body)| RuleDef { head, body })
}
