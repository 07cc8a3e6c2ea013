//! Fuzz test for request parameter parsing and fingerprinting
//!
//! Feeds arbitrary JSON objects through `QueryDescriptor::from_params` and,
//! when they parse, through the lookup planner. Looks for:
//! - Panics on unexpected value shapes
//! - Non-deterministic fingerprints
//! - Plans that disagree with the descriptor's year range
//!
//! Run with: cargo +nightly fuzz run params_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use statcache_core::{QueryDescriptor, Year, YearPlanner};

fuzz_target!(|data: &[u8]| {
    let Ok(serde_json::Value::Object(params)) = serde_json::from_slice::<serde_json::Value>(data)
    else {
        return;
    };

    let Ok(descriptor) = QueryDescriptor::from_params(&params, Year::new(2024)) else {
        return;
    };

    let planner = YearPlanner::default();
    let first = planner.plan_lookup(&descriptor);
    let second = planner.plan_lookup(&descriptor);
    assert_eq!(first, second, "planning must be deterministic");

    if let Ok(plan) = first {
        let expected = if descriptor.split().is_career() {
            1
        } else {
            descriptor.years().len()
        };
        assert_eq!(plan.entries().len(), expected);
        assert_eq!(plan.requested_years().len(), descriptor.years().len());
    }
});
