//! Fuzz target for config file parsing.
//!
//! Tests that JSON and TOML configuration parsing and validation handle
//! arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sq_config::{parse_config_str, validate_config, ConfigFormat};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for format in [ConfigFormat::Json, ConfigFormat::Toml] {
        if let Ok(config) = parse_config_str(text, format) {
            let _ = validate_config(&config);
            let _ = config.search.budget();
        }
    }
});
