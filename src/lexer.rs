//! Lexer for EQL-S
//!
//! Tokenizes query text into a stream for the parser. Keywords are
//! case-insensitive; everything else is case-preserving.

use chumsky::prelude::*;
use std::ops::Range;

/// Token types for EQL-S
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    // Keywords
    Find,
    As,
    Where,
    Return,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    And,
    Between,
    Contains,
    Matches,
    From,
    True,
    False,

    // Names and literals
    Ident(String),
    /// `?name`
    Var(String),
    /// `.segment` following a variable or another segment
    Field(String),
    Str(String),
    /// Kept as source text so tokens stay `Eq + Hash`
    Number(String),
    /// `/pattern/flags`
    Regex { pattern: String, flags: String },

    // Punctuation
    LParen,  // (
    RParen,  // )
    Comma,   // ,
    Pipe,    // |
    Eq,      // =
    NotEq,   // !=
    Gt,      // >
    Gte,     // >=
    Lt,      // <
    Lte,     // <=
    Implies, // :-
}

impl Token {
    /// Keyword spelling, for keywords reused as names.
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            Token::Find => "find",
            Token::As => "as",
            Token::Where => "where",
            Token::Return => "return",
            Token::Order => "order",
            Token::By => "by",
            Token::Asc => "asc",
            Token::Desc => "desc",
            Token::Limit => "limit",
            Token::And => "and",
            Token::Between => "between",
            Token::Contains => "contains",
            Token::Matches => "matches",
            Token::From => "from",
            Token::True => "true",
            Token::False => "false",
            _ => return None,
        })
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(kw) = self.keyword() {
            return write!(f, "{}", kw.to_ascii_uppercase());
        }
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Var(s) => write!(f, "?{}", s),
            Token::Field(s) => write!(f, ".{}", s),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Regex { pattern, flags } => write!(f, "/{}/{}", pattern, flags),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Pipe => write!(f, "|"),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "!="),
            Token::Gt => write!(f, ">"),
            Token::Gte => write!(f, ">="),
            Token::Lt => write!(f, "<"),
            Token::Lte => write!(f, "<="),
            Token::Implies => write!(f, ":-"),
            _ => unreachable!("keywords handled above"),
        }
    }
}

/// Type alias for spans
pub type Span = Range<usize>;

fn is_word_start(c: &char) -> bool {
    c.is_alphabetic() || *c == '_'
}

fn is_word_char(c: &char) -> bool {
    c.is_alphanumeric() || *c == '_' || *c == '-'
}

/// Create a lexer for EQL-S
pub fn lexer() -> impl Parser<char, Vec<(Token, Span)>, Error = Simple<char>> {
    let word = filter(is_word_start)
        .chain(filter(is_word_char).repeated())
        .collect::<String>();

    let keyword_or_ident = word.clone().map(|s: String| match s.to_ascii_lowercase().as_str() {
        "find" => Token::Find,
        "as" => Token::As,
        "where" => Token::Where,
        "return" => Token::Return,
        "order" => Token::Order,
        "by" => Token::By,
        "asc" => Token::Asc,
        "desc" => Token::Desc,
        "limit" => Token::Limit,
        "and" => Token::And,
        "between" => Token::Between,
        "contains" => Token::Contains,
        "matches" => Token::Matches,
        "from" => Token::From,
        "true" => Token::True,
        "false" => Token::False,
        _ => Token::Ident(s),
    });

    let var = just('?').ignore_then(word).map(Token::Var);

    // Attribute segments may hold anything JSON keys commonly do
    let field = just('.')
        .ignore_then(
            filter(|c: &char| is_word_char(c) || *c == '$' || *c == '@')
                .repeated()
                .at_least(1)
                .collect::<String>(),
        )
        .map(Token::Field);

    let number = just('-')
        .or_not()
        .then(text::digits(10))
        .then(just('.').ignore_then(text::digits(10)).or_not())
        .map(|((neg, int), frac): ((Option<char>, String), Option<String>)| {
            let mut s = String::new();
            if neg.is_some() {
                s.push('-');
            }
            s.push_str(&int);
            if let Some(frac) = frac {
                s.push('.');
                s.push_str(&frac);
            }
            Token::Number(s)
        });

    let escape = just('\\').ignore_then(choice((
        just('\\'),
        just('"'),
        just('\''),
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
    )));

    let double_quoted = just('"')
        .ignore_then(filter(|c: &char| *c != '\\' && *c != '"').or(escape.clone()).repeated())
        .then_ignore(just('"'))
        .collect::<String>();
    let single_quoted = just('\'')
        .ignore_then(filter(|c: &char| *c != '\\' && *c != '\'').or(escape).repeated())
        .then_ignore(just('\''))
        .collect::<String>();
    let string = double_quoted.or(single_quoted).map(Token::Str);

    // `\/` is unescaped; every other escape is left for the regex engine
    let regex_char = just('\\')
        .ignore_then(any())
        .map(|c: char| if c == '/' { vec!['/'] } else { vec!['\\', c] })
        .or(filter(|c: &char| *c != '/' && *c != '\\' && *c != '\n').map(|c| vec![c]));
    let regex = just('/')
        .ignore_then(regex_char.repeated().flatten().collect::<String>())
        .then_ignore(just('/'))
        .then(filter(|c: &char| c.is_ascii_alphabetic()).repeated().collect::<String>())
        .map(|(pattern, flags)| Token::Regex { pattern, flags });

    let punctuation = choice((
        just(":-").to(Token::Implies),
        just("!=").to(Token::NotEq),
        just("<>").to(Token::NotEq),
        just(">=").to(Token::Gte),
        just("<=").to(Token::Lte),
        just("==").to(Token::Eq),
        just('=').to(Token::Eq),
        just('>').to(Token::Gt),
        just('<').to(Token::Lt),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just('|').to(Token::Pipe),
    ));

    // Comments: -- to end of line
    // Must be tried before numbers so `--` is not read as a sign
    let line_comment = just("--")
        .then(none_of('\n').repeated())
        .then(just('\n').or_not())
        .ignored();

    let token = choice((number, string, regex, var, field, keyword_or_ident, punctuation));

    let token_or_skip = line_comment.to(None).or(token.map(Some));

    token_or_skip
        .map_with_span(|opt_tok, span| opt_tok.map(|tok| (tok, span)))
        .padded()
        .repeated()
        .then_ignore(end())
        .map(|items| items.into_iter().flatten().collect())
}

/// Turn keywords in name position back into identifiers, keeping their
/// source spelling.
///
/// A keyword is a name when it is followed by `(` (a predicate call) or
/// `AS` (a FIND binding), or directly follows the leading `from` of a
/// pipeline. So `find(?x)` is a goal and `FIND Order AS ?o` looks for type
/// `Order`.
pub fn restore_names(source: &str, tokens: Vec<(Token, Span)>) -> Vec<(Token, Span)> {
    let is_name = |i: usize| {
        let next = tokens.get(i + 1).map(|(t, _)| t);
        let prev = i.checked_sub(1).map(|p| &tokens[p].0);
        matches!(next, Some(Token::LParen) | Some(Token::As))
            || (i == 1 && matches!(prev, Some(Token::From)))
    };

    let renamed: Vec<bool> = (0..tokens.len())
        .map(|i| tokens[i].0.keyword().is_some() && is_name(i))
        .collect();

    tokens
        .into_iter()
        .zip(renamed)
        .map(|((tok, span), rename)| {
            if rename {
                let text: String = source.chars().skip(span.start).take(span.end - span.start).collect();
                (Token::Ident(text), span)
            } else {
                (tok, span)
            }
        })
        .collect()
}

// Unit tests live in tests/unit_parsing.rs
