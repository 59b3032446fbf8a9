//! Thread-local RNG Adapter
//!
//! Implements `RandomSource` on top of `rand::thread_rng()`.

use std::ops::RangeInclusive;

use rand::Rng;

use crate::ports::random::RandomSource;

/// Random source backed by the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn probability(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }

    fn uniform(&self, range: RangeInclusive<f64>) -> f64 {
        if range.start() >= range.end() {
            return *range.start();
        }
        rand::thread_rng().gen_range(range)
    }

    fn integer(&self, range: RangeInclusive<u64>) -> u64 {
        if range.is_empty() {
            return *range.start();
        }
        rand::thread_rng().gen_range(range)
    }
}
