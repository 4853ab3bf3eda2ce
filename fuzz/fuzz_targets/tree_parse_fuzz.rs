//! Fuzz test for translation tree and static data parsing
//!
//! Arbitrary JSON-ish input must produce `Ok` or a validation error, never
//! a panic. Accepted trees must survive flatten/unflatten.
//!
//! Run with: cargo +nightly fuzz run tree_parse_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rosetta_cache::StaticData;
use rosetta_core::{flatten, parse_tree_str, unflatten};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(tree) = parse_tree_str(input) {
            let flat = flatten(&tree);
            let rebuilt = flatten(&unflatten(&flat));
            assert!(
                rebuilt.len() <= flat.len(),
                "Unflatten must not invent keys"
            );
        }

        let _ = StaticData::from_json_str(input);
    }
});
