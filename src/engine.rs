//! The caller-facing facade: one store, one compiler, one evaluator.
//!
//! [`Engine::query`] runs the whole pipeline (compile, evaluate, shape) and
//! returns a [`QueryResponse`] whose JSON form is what external callers
//! consume:
//!
//! ```text
//! { "ok": true, "results": [...], "count": 2, "totalCount": 2, "executionTime": 0.04 }
//! { "ok": false, "error": "...", "parseErrors": [{ "line": 1, "column": 6, ... }] }
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::compile::{Compiled, Processor};
use crate::config::EngineConfig;
use crate::error::{EvalError, ParseError, RuleError};
use crate::ingest::{self, IngestOptions};
use crate::query::{EvalResult, Evaluator, Query, Row, Rule};
use crate::store::{CatalogEntry, Fact, FactStore, Link, StoreStats};

/// Successful query response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySuccess {
    pub ok: bool,
    pub results: Vec<Row>,
    pub count: usize,
    pub total_count: usize,
    /// Milliseconds
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
}

/// Failed query response: compile errors or an evaluation error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFailure {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<ParseError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Success(QuerySuccess),
    Failure(QueryFailure),
}

impl QueryResponse {
    fn failure(error: String, parse_errors: Vec<ParseError>) -> Self {
        QueryResponse::Failure(QueryFailure {
            ok: false,
            error,
            parse_errors,
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, QueryResponse::Success(_))
    }

    /// Result rows; empty for a failure.
    pub fn rows(&self) -> &[Row] {
        match self {
            QueryResponse::Success(s) => &s.results,
            QueryResponse::Failure(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    store: FactStore,
    processor: Processor,
    evaluator: Evaluator,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let evaluator = Evaluator::new()
            .with_max_bindings(config.max_bindings)
            .with_explain(config.explain);
        let mut processor = Processor::new();
        let store = FactStore::new();
        if config.validate_schema {
            processor.set_schema(store.catalog());
        }
        Self {
            config,
            store,
            processor,
            evaluator,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    // ========================================================================
    // Loading
    // ========================================================================

    pub fn add_facts(&mut self, facts: impl IntoIterator<Item = Fact>) {
        self.store.add_facts(facts);
        self.sync_schema();
    }

    pub fn add_links(&mut self, links: impl IntoIterator<Item = Link>) {
        self.store.add_links(links);
    }

    /// Flatten one JSON value into facts about `entity`. Returns the number
    /// of facts added.
    pub fn ingest(&mut self, value: &Value, entity: &str, type_label: &str) -> usize {
        let facts = ingest::ingest_with(value, entity, type_label, self.ingest_options());
        let added = facts.len();
        self.add_facts(facts);
        added
    }

    /// Ingest a record or array of records keyed by `id_field`. Returns the
    /// number of facts added.
    pub fn ingest_collection(&mut self, records: &Value, type_label: &str, id_field: &str) -> usize {
        let facts = ingest::ingest_collection(records, type_label, id_field, self.ingest_options());
        let added = facts.len();
        self.add_facts(facts);
        added
    }

    fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            detect_dates: self.config.detect_dates,
        }
    }

    fn sync_schema(&mut self) {
        if self.config.validate_schema {
            self.processor.set_schema(self.store.catalog());
        }
    }

    pub fn catalog(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.store.catalog()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Drop all facts, links and rules; keep the configuration.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    // ========================================================================
    // Rules
    // ========================================================================

    pub fn add_rule(&mut self, rule: Rule) -> Result<(), RuleError> {
        self.evaluator.add_rule(rule)
    }

    /// Compile and register `head(?x) :- goal, goal`.
    pub fn define_rule(&mut self, source: &str) -> Result<(), RuleError> {
        let rule = self.processor.compile_rule(source).map_err(RuleError::Parse)?;
        self.evaluator.add_rule(rule)
    }

    // ========================================================================
    // Querying
    // ========================================================================

    pub fn compile(&self, source: &str) -> Compiled {
        self.processor.compile(source)
    }

    pub fn evaluate(&self, query: &Query) -> Result<EvalResult, EvalError> {
        self.evaluator.evaluate(&self.store, query)
    }

    /// Compile, evaluate and shape a query.
    pub fn query(&self, source: &str) -> QueryResponse {
        self.respond(source, self.config.explain)
    }

    /// Like [`Engine::query`], always attaching the plan.
    pub fn explain(&self, source: &str) -> QueryResponse {
        self.respond(source, true)
    }

    fn respond(&self, source: &str, explain: bool) -> QueryResponse {
        let Compiled { query, errors } = self.processor.compile(source);
        let Some(compiled) = query else {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return QueryResponse::failure(message, errors);
        };

        let result = if explain {
            self.evaluator.explain(&self.store, &compiled.query)
        } else {
            self.evaluator.evaluate(&self.store, &compiled.query)
        };
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(error = %e, "query failed");
                return QueryResponse::failure(e.to_string(), Vec::new());
            }
        };

        let shaped = compiled.shape.apply(result.bindings);
        QueryResponse::Success(QuerySuccess {
            ok: true,
            count: shaped.rows.len(),
            total_count: shaped.total_count,
            results: shaped.rows,
            execution_time: result.execution_time.as_secs_f64() * 1000.0,
            plan: result
                .plan
                .map(|steps| steps.iter().map(ToString::to_string).collect()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_response_shape() {
        let engine = Engine::default();
        let response = serde_json::to_value(engine.query("FIND post AS")).unwrap();
        assert_eq!(response["ok"], json!(false));
        assert!(response["parseErrors"].is_array());
        assert!(response.get("results").is_none());
    }

    #[test]
    fn reset_keeps_config() {
        let config = EngineConfig {
            explain: true,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config.clone());
        engine.ingest(&json!({"a": 1}), "x:1", "x");
        engine.reset();
        assert!(engine.store().is_empty());
        assert_eq!(engine.config(), &config);
    }
}
