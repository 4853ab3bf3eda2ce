//! Fuzz test for the cache key codec
//!
//! Decoding accepts any string. This target checks that it never panics
//! and that decode/encode reaches a fixed point after one step.
//!
//! Run with: cargo +nightly fuzz run key_decode_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rosetta_core::CacheKey;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let descriptor = CacheKey::decode(input);
        let canonical = CacheKey::encode(&descriptor);

        assert_eq!(canonical.descriptor(), descriptor, "Decode must invert encode");
        assert_eq!(
            CacheKey::encode(&canonical.descriptor()),
            canonical,
            "Canonical keys must be stable"
        );

        let parsed: CacheKey = match input.parse() {
            Ok(key) => key,
            Err(never) => match never {},
        };
        assert_eq!(parsed, canonical, "FromStr must canonicalize like decode");
    }
});
