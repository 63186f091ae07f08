//! Error types for factql
//!
//! Parse and semantic problems are plain values ([`ParseError`]): the
//! compiler collects them into a list instead of failing. Evaluation and
//! rule registration failures are [`EvalError`] and [`RuleError`].
//!
//! [`format_parse_errors`] renders a list of parse errors against the query
//! source using ariadne.

use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::error::SimpleReason;
use chumsky::prelude::Simple;
use serde::Serialize;
use thiserror::Error;

use crate::lexer::{Span, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Malformed query text
    Syntax,
    /// Well-formed text referring to unknown attributes or unbound variables
    Semantic,
}

/// A located problem with query text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseError {
    /// 1-based
    pub line: usize,
    /// 1-based, in characters
    pub column: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expected: Vec<String>,
    pub kind: ErrorKind,
    /// Character range in the source
    #[serde(skip)]
    pub span: Span,
}

impl ParseError {
    pub fn syntax(source: &str, span: Span, message: impl Into<String>, expected: Vec<String>) -> Self {
        Self::located(source, span, message.into(), expected, ErrorKind::Syntax)
    }

    pub fn semantic(source: &str, span: Span, message: impl Into<String>) -> Self {
        Self::located(source, span, message.into(), Vec::new(), ErrorKind::Semantic)
    }

    fn located(source: &str, span: Span, message: String, expected: Vec<String>, kind: ErrorKind) -> Self {
        let (line, column) = line_column(source, span.start);
        Self {
            line,
            column,
            message,
            expected,
            kind,
            span,
        }
    }

    /// Convert a lexer error.
    pub fn from_lexer(source: &str, error: &Simple<char>) -> Self {
        let found = error
            .found()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string());
        let expected: Vec<String> = error
            .expected()
            .filter_map(|opt| opt.as_ref())
            .map(|c| format!("'{}'", c))
            .collect();
        let message = match error.reason() {
            SimpleReason::Custom(msg) => msg.clone(),
            SimpleReason::Unclosed { delimiter, .. } => format!("unclosed '{}'", delimiter),
            SimpleReason::Unexpected => format!("unexpected character {}", found),
        };
        Self::syntax(source, error.span(), message, expected)
    }

    /// Convert a parser error. Token streams carry character spans.
    pub fn from_parser(source: &str, error: &Simple<Token>) -> Self {
        let found = error
            .found()
            .map(|t| format!("'{}'", t))
            .unwrap_or_else(|| "end of input".to_string());
        let mut expected: Vec<String> = error
            .expected()
            .map(|opt| match opt {
                Some(t) => format!("'{}'", t),
                None => "end of input".to_string(),
            })
            .collect();
        expected.sort();
        expected.dedup();

        let message = match error.reason() {
            SimpleReason::Custom(msg) => msg.clone(),
            SimpleReason::Unclosed { delimiter, .. } => format!("unclosed '{}'", delimiter),
            SimpleReason::Unexpected => match (error.label(), expected.is_empty()) {
                (Some(label), _) => format!("unexpected {}, expected {}", found, label),
                (None, false) => format!("unexpected {}, expected one of: {}", found, expected.join(", ")),
                (None, true) => format!("unexpected {}", found),
            },
        };

        let len = source.chars().count();
        let span = error.span();
        let span = span.start.min(len)..span.end.min(len);
        Self::syntax(source, span, message, expected)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// 1-based line and column of a character offset.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for c in source.chars().take(offset) {
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Format parse errors into a user-friendly report
pub fn format_parse_errors(source: &str, errors: &[ParseError]) -> String {
    let mut output = Vec::new();

    for error in errors {
        let title = match error.kind {
            ErrorKind::Syntax => "Parse error",
            ErrorKind::Semantic => "Semantic error",
        };
        let report = Report::build(ReportKind::Error, (), error.span.start)
            .with_message(title)
            .with_label(
                Label::new(error.span.clone())
                    .with_message(&error.message)
                    .with_color(Color::Red),
            );

        if let Err(e) = report.finish().write(Source::from(source), &mut output) {
            tracing::warn!("failed to render error report: {}", e);
            return errors.iter().map(|e| format!("{}\n", e)).collect();
        }
    }

    String::from_utf8(output).unwrap_or_else(|_| "Error formatting failed".to_string())
}

/// Evaluation failures. Distinct from an empty result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown predicate '{0}'")]
    UnknownPredicate(String),

    #[error("predicate '{predicate}' expects {expected} argument(s), got {found}")]
    Arity {
        predicate: String,
        expected: String,
        found: usize,
    },

    #[error("invalid argument to '{predicate}': {message}")]
    InvalidArgument { predicate: String, message: String },

    #[error("invalid regular expression /{pattern}/: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("variable ?{0} is only used in filters and can never be bound")]
    UnboundVariable(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("binding limit of {0} exceeded")]
    BindingLimit(usize),
}

/// Rule registration failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("rule '{0}' would shadow a built-in predicate")]
    ShadowsBuiltin(String),

    #[error("rule '{0}' is already defined")]
    Duplicate(String),

    #[error("rule '{rule}' refers to '{predicate}', which is not a built-in or an earlier rule")]
    UnknownPredicate { rule: String, predicate: String },

    #[error("rule '{0}' uses negation, which is not supported")]
    Negation(String),

    #[error("rule '{rule}': head variable ?{var} does not occur in the body")]
    UnboundHeadVariable { rule: String, var: String },

    #[error("rule '{0}' has an empty body")]
    EmptyBody(String),

    #[error("rule '{rule}': {source}")]
    Body {
        rule: String,
        #[source]
        source: EvalError,
    },

    #[error("{}", format_list(.0))]
    Parse(Vec<ParseError>),
}

fn format_list(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
