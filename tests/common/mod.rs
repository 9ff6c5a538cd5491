//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use crossbeam_channel::Receiver;
use std::time::{Duration, Instant};

/// Default wait for asynchronous results
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
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

/// Receive until `pick` returns `Some`, failing after [`test_timeout`]
pub fn wait_for<T, R>(rx: &Receiver<T>, mut pick: impl FnMut(T) -> Option<R>) -> R {
    let deadline = Instant::now() + test_timeout();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(item) => {
                if let Some(found) = pick(item) {
                    return found;
                }
            }
            Err(e) => panic!("timed out waiting for message: {}", e),
        }
    }
}
