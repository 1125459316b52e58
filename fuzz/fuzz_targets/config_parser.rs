//! Fuzz target for the engine config parser.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_config_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use weave_query::EngineConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Any config that parses has already passed validation.
        if let Ok(config) = EngineConfig::from_str(input) {
            assert!(config.validate().is_ok());
        }
    }
});
