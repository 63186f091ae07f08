//! REPL (Read-Eval-Print Loop) for factql
//!
//! Wraps an [`Engine`] with line buffering and meta-commands. Any line that
//! is not a meta-command is a query. A query continues onto the next line
//! while parentheses are open or the line ends with `|` or `,`.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::EngineConfig;
use crate::engine::{Engine, QueryResponse};
use crate::error::{format_parse_errors, RuleError};
use crate::store::{CatalogEntry, Link};

/// Field used as the record id when `:load` is not given one.
pub const DEFAULT_ID_FIELD: &str = "id";

pub struct ReplState {
    pub engine: Engine,

    /// Multi-line input buffer
    pub input_buffer: String,

    /// Parenthesis depth for multi-line detection
    pub paren_depth: i32,
}

impl Default for ReplState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ReplState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(config),
            input_buffer: String::new(),
            paren_depth: 0,
        }
    }

    /// Drop all data and rules
    pub fn reset(&mut self) {
        self.engine.reset();
        self.input_buffer.clear();
        self.paren_depth = 0;
    }

    /// Process a line of input, handling multi-line continuation
    pub fn process_line(&mut self, line: &str) -> InputResult {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if self.input_buffer.is_empty() {
                return InputResult::Empty;
            }
            return InputResult::Incomplete;
        }

        // Meta-command (only at start, not in continuation)
        if trimmed.starts_with(':') && self.input_buffer.is_empty() {
            return InputResult::MetaCommand(MetaCommand::parse(trimmed));
        }

        if !self.input_buffer.is_empty() {
            self.input_buffer.push('\n');
        }
        self.input_buffer.push_str(line);

        for ch in line.chars() {
            match ch {
                '(' => self.paren_depth += 1,
                ')' => self.paren_depth -= 1,
                _ => {}
            }
        }

        if self.paren_depth <= 0 && !trimmed.ends_with('|') && !trimmed.ends_with(',') {
            let input = std::mem::take(&mut self.input_buffer);
            self.paren_depth = 0;
            InputResult::Query(input)
        } else {
            InputResult::Incomplete
        }
    }

    /// Force submit current buffer (for Ctrl-D or double-empty-line)
    pub fn force_submit(&mut self) -> Option<String> {
        if self.input_buffer.is_empty() {
            None
        } else {
            self.paren_depth = 0;
            Some(std::mem::take(&mut self.input_buffer))
        }
    }

    pub fn execute_query(&self, source: &str) -> QueryResponse {
        self.engine.query(source)
    }

    pub fn explain_query(&self, source: &str) -> QueryResponse {
        self.engine.explain(source)
    }

    /// Load a JSON file of records as entities of `type_label`.
    /// Returns the number of facts added.
    pub fn load_file(&mut self, type_label: &str, path: &Path, id_field: &str) -> Result<usize, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let records: Value = serde_json::from_str(&content)
            .map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?;
        let added = self.engine.ingest_collection(&records, type_label, id_field);
        tracing::info!(path = %path.display(), type_label, facts = added, "file loaded");
        Ok(added)
    }

    pub fn add_link(&mut self, source: &str, relation: &str, target: &str) {
        self.engine.add_links([Link::new(source, relation, target)]);
    }

    pub fn define_rule(&mut self, source: &str) -> Result<(), String> {
        self.engine.define_rule(source).map_err(|e| match e {
            RuleError::Parse(errors) => format_parse_errors(source, &errors),
            other => other.to_string(),
        })
    }
}

/// Result of processing a line of input
#[derive(Debug, Clone, PartialEq)]
pub enum InputResult {
    MetaCommand(MetaCommand),
    Query(String),
    Incomplete,
    Empty,
}

/// Meta-commands supported by the REPL
#[derive(Debug, Clone, PartialEq)]
pub enum MetaCommand {
    Help,
    Quit,
    /// `:load <type> <file> [id_field]`
    Load {
        type_label: String,
        path: PathBuf,
        id_field: String,
    },
    /// `:link <source> <relation> <target>`
    Link {
        source: String,
        relation: String,
        target: String,
    },
    /// `:rule head(?x) :- goal, ...`
    Rule(String),
    Catalog,
    Stats,
    /// `:explain <query>`
    Explain(String),
    Reset,
    Unknown(String),
}

impl MetaCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim_start_matches(':').trim();
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let rest = input[cmd.len()..].trim();
        let args: Vec<&str> = parts.collect();

        match cmd {
            "help" | "h" | "?" => MetaCommand::Help,
            "quit" | "q" | "exit" => MetaCommand::Quit,
            "load" => match args.as_slice() {
                [type_label, path] | [type_label, path, _] => MetaCommand::Load {
                    type_label: type_label.to_string(),
                    path: PathBuf::from(path),
                    id_field: args.get(2).unwrap_or(&DEFAULT_ID_FIELD).to_string(),
                },
                _ => MetaCommand::Unknown(":load requires <type> <file> [id_field]".to_string()),
            },
            "link" => match args.as_slice() {
                [source, relation, target] => MetaCommand::Link {
                    source: source.to_string(),
                    relation: relation.to_string(),
                    target: target.to_string(),
                },
                _ => MetaCommand::Unknown(":link requires <source> <relation> <target>".to_string()),
            },
            "rule" if !rest.is_empty() => MetaCommand::Rule(rest.to_string()),
            "rule" => MetaCommand::Unknown(":rule requires a definition".to_string()),
            "catalog" | "schema" => MetaCommand::Catalog,
            "stats" => MetaCommand::Stats,
            "explain" if !rest.is_empty() => MetaCommand::Explain(rest.to_string()),
            "explain" => MetaCommand::Unknown(":explain requires a query".to_string()),
            "reset" => MetaCommand::Reset,
            other => MetaCommand::Unknown(format!("Unknown command: :{}", other)),
        }
    }
}

/// Render a query response for the terminal.
///
/// Rows print as JSON objects, one per line; compile errors are rendered
/// against the query source.
pub fn format_response(source: &str, response: &QueryResponse) -> String {
    match response {
        QueryResponse::Success(success) => {
            let mut out = String::new();
            if let Some(plan) = &success.plan {
                out.push_str("Plan:\n");
                for (i, step) in plan.iter().enumerate() {
                    out.push_str(&format!("  {}. {}\n", i + 1, step));
                }
            }
            for row in &success.results {
                match serde_json::to_string(row) {
                    Ok(json) => out.push_str(&json),
                    Err(e) => out.push_str(&format!("<unprintable row: {}>", e)),
                }
                out.push('\n');
            }
            let shown = if success.count < success.total_count {
                format!(" (of {})", success.total_count)
            } else {
                String::new()
            };
            out.push_str(&format!(
                "{} row(s){} in {:.3} ms",
                success.count, shown, success.execution_time
            ));
            out
        }
        QueryResponse::Failure(failure) if !failure.parse_errors.is_empty() => {
            format_parse_errors(source, &failure.parse_errors)
        }
        QueryResponse::Failure(failure) => format!("Error: {}", failure.error),
    }
}

/// One line per attribute: name, type, cardinality, distinct values.
pub fn format_catalog<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> String {
    let mut out = String::new();
    for entry in entries {
        let examples: Vec<String> = entry.examples.iter().map(|e| e.to_string()).collect();
        out.push_str(&format!(
            "  {:<24} {:<8} {:<5} {:>6} distinct  e.g. {}\n",
            entry.attribute,
            format!("{:?}", entry.value_type).to_lowercase(),
            format!("{:?}", entry.cardinality).to_lowercase(),
            entry.distinct_count,
            examples.join(", ")
        ));
    }
    if out.is_empty() {
        out.push_str("  (empty)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_continues_after_trailing_pipe() {
        let mut state = ReplState::default();
        assert_eq!(state.process_line("from post |"), InputResult::Incomplete);
        assert_eq!(
            state.process_line("return ?post.title"),
            InputResult::Query("from post |\nreturn ?post.title".to_string())
        );
    }

    #[test]
    fn meta_commands() {
        assert_eq!(
            MetaCommand::parse(":load post posts.json"),
            MetaCommand::Load {
                type_label: "post".to_string(),
                path: PathBuf::from("posts.json"),
                id_field: "id".to_string(),
            }
        );
        assert_eq!(
            MetaCommand::parse(":rule popular(?p) :- attr(?p, \"views\", ?v), gt(?v, 1000)"),
            MetaCommand::Rule("popular(?p) :- attr(?p, \"views\", ?v), gt(?v, 1000)".to_string())
        );
        assert!(matches!(MetaCommand::parse(":link a b"), MetaCommand::Unknown(_)));
        assert!(matches!(MetaCommand::parse(":frobnicate"), MetaCommand::Unknown(_)));
    }
}
