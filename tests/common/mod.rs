//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::{Duration, Instant};

/// How long a condition may take before a test gives up
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Poll `cond` until it holds, panicking with `what` after [`test_timeout`]
pub fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + test_timeout();
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
