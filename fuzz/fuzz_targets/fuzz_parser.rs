//! Fuzz the factql lexer and parser
//!
//! Every surface syntax goes through the same entry point, so this
//! covers FIND, pipeline and goal-list parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed input must come back as errors, not panics
        let _ = factql::parse(input);
        let _ = factql::parse_rule(input);
    }
});
