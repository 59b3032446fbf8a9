//! Random Source Port - Injectable Randomness for the Workload
//!
//! Every random decision the loops make (durations, error injection,
//! user ids, simulated resource usage) goes through this trait so tests
//! can force a branch deterministically.

use std::ops::RangeInclusive;

/// Source of random draws used by the simulated workload.
///
/// Implementations must be cheap to call and safe to share across tasks.
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send + Sync + 'static {
    /// Draw a probability in `[0, 1)`. Compared against the error rate.
    fn probability(&self) -> f64;

    /// Draw a float uniformly from `range`.
    fn uniform(&self, range: RangeInclusive<f64>) -> f64;

    /// Draw an integer uniformly from `range`.
    fn integer(&self, range: RangeInclusive<u64>) -> u64;
}
