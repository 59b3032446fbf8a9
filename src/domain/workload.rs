//! Workload Model - Fixed Random Ranges and Processing Outcomes
//!
//! The simulated workload has no configurable shape: every range and
//! probability used by the loops is a constant here.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Probability that one processed item fails validation.
pub const ERROR_PROBABILITY: f64 = 0.05;

/// Simulated processing time of the root `process_data` span (seconds).
pub const PROCESSING_SECS: RangeInclusive<f64> = 0.1..=0.3;

/// Simulated time of each child step, `validate_data` and `store_data` (seconds).
pub const CHILD_STEP_SECS: RangeInclusive<f64> = 0.05..=0.15;

/// Range of synthetic user numbers (`user_<n>`).
pub const USER_IDS: RangeInclusive<u64> = 1..=100;

/// Pause between two worker iterations.
pub const ITERATION_DELAY: Duration = Duration::from_secs(1);

/// Cadence of the system metrics simulator.
pub const SYSTEM_METRICS_INTERVAL: Duration = Duration::from_secs(5);

/// Simulated CPU usage range (percent).
pub const CPU_PERCENT: RangeInclusive<f64> = 10.0..=90.0;

/// Simulated memory usage range (bytes).
pub const MEMORY_BYTES: RangeInclusive<u64> = 100_000_000..=500_000_000;

/// Label value of `app_errors_total{error_type}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Simulated validation failure inside `process_item`.
    Validation,
    /// Fault that ended the trace worker loop.
    Worker,
}

impl ErrorType {
    /// All label values, pre-initialised at registration.
    pub const ALL: [Self; 2] = [Self::Validation, Self::Worker];

    /// Prometheus label value.
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Worker => "worker_error",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Result of processing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Item processed; `app_items_processed_total` was incremented.
    Completed,
    /// Item failed; `app_errors_total{error_type}` was incremented.
    Failed(ErrorType),
}

impl ProcessingOutcome {
    /// Decide the outcome from a probability draw in `[0, 1)`.
    pub fn from_draw(p: f64) -> Self {
        if p < ERROR_PROBABILITY {
            Self::Failed(ErrorType::Validation)
        } else {
            Self::Completed
        }
    }

    /// Value of the `processing.status` span attribute.
    pub const fn status_label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed(_) => "error",
        }
    }
}

/// Synthetic user id for a drawn user number.
pub fn user_id(n: u64) -> String {
    format!("user_{n}")
}
