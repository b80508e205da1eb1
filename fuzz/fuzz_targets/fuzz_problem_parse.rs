//! Fuzz target for problem file parsing.
//!
//! Tests that problem files are either rejected with an error or built into
//! a valid model, never a panic. Oversized tables must come back as
//! `ProblemError::TooLarge`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sq_core::problem::ProblemSpec;

fuzz_target!(|data: &[u8]| {
    let Ok(spec) = serde_json::from_slice::<ProblemSpec>(data) else {
        return;
    };
    let _ = spec.build();
});
