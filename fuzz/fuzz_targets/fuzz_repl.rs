//! Fuzz the factql REPL pipeline
//!
//! Feeds input line by line through a REPL holding a small dataset, so
//! compilation, evaluation and response shaping all run.

#![no_main]

use libfuzzer_sys::fuzz_target;
use factql::repl::{InputResult, ReplState};
use serde_json::json;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut state = ReplState::default();
        state.engine.ingest_collection(
            &json!([{"id": 1, "views": 10, "tags": ["a", "b"]}, {"id": 2, "title": "x"}]),
            "post",
            "id",
        );

        for line in input.lines() {
            if let InputResult::Query(query) = state.process_line(line) {
                let _ = state.execute_query(&query);
            }
        }
        if let Some(query) = state.force_submit() {
            let _ = state.execute_query(&query);
        }
    }
});
