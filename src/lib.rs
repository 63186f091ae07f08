//! factql: a schema-less fact store with a small Datalog evaluator
//!
//! JSON documents are flattened into entity/attribute/value facts, indexed
//! three ways, and queried through EQL-S, a query language with three
//! surface syntaxes that all compile to one goal-list representation.
//!
//! ```text
//! FIND post AS ?p WHERE ?p.views > 1000 RETURN ?p, ?p.title
//! ```

pub mod ast;
pub mod atom;
pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod repl;
pub mod store;

pub use atom::Atom;
pub use compile::{Compiled, CompiledQuery, Processor};
pub use config::EngineConfig;
pub use engine::{Engine, QueryResponse};
pub use error::{format_parse_errors, EvalError, ParseError, RuleError};
pub use store::{Fact, FactStore, Link};

use chumsky::prelude::*;
use chumsky::Stream;

use ast::{RuleDef, Span, Statement};
use lexer::Token;

fn tokenize(input: &str) -> Result<Vec<(Token, Span)>, Vec<ParseError>> {
    lexer::lexer()
        .parse(input)
        .map(|tokens| lexer::restore_names(input, tokens))
        .map_err(|errs| errs.iter().map(|e| ParseError::from_lexer(input, e)).collect())
}

fn run_parser<T>(
    input: &str,
    tokens: Vec<(Token, Span)>,
    parser: impl Parser<Token, T, Error = Simple<Token>>,
) -> Result<T, Vec<ParseError>> {
    let len = input.chars().count();
    parser
        .parse(Stream::from_iter(len..len + 1, tokens.into_iter()))
        .map_err(|errs| errs.iter().map(|e| ParseError::from_parser(input, e)).collect())
}

/// Parse an EQL-S query in any of its surface syntaxes
pub fn parse(input: &str) -> Result<Statement, Vec<ParseError>> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(vec![ParseError::syntax(input, 0..0, "empty query", Vec::new())]);
    }
    let syntax = parser::detect_syntax(&tokens);
    run_parser(input, tokens, parser::statement_parser(syntax))
}

/// Parse a rule definition: `head(?x) :- goal, goal`
pub fn parse_rule(input: &str) -> Result<RuleDef, Vec<ParseError>> {
    let tokens = tokenize(input)?;
    run_parser(input, tokens, parser::rule_parser())
}
