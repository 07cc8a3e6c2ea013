//! Fuzz test for year-tag key decoding
//!
//! Stored keys are read back from disk, so decoding must reject anything
//! malformed without panicking and must re-encode accepted keys exactly.
//!
//! Run with: cargo +nightly fuzz run year_tag_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use statcache_storage::{YearTagKey, YEAR_TAG_KEY_LEN};

fuzz_target!(|data: &[u8]| {
    match YearTagKey::decode(data) {
        Some(key) => {
            assert_eq!(data.len(), YEAR_TAG_KEY_LEN);
            assert_eq!(&key.encode()[..], data);
        }
        None => assert_ne!(data.len(), YEAR_TAG_KEY_LEN),
    }
});
