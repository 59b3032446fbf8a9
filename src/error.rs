//! Error Types - Telemetry and Worker Failures
//!
//! Library-level errors are typed with `thiserror`; the binary wiring in
//! `main.rs` wraps them with `anyhow::Context`.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the telemetry plumbing (metrics registry, span pipeline).
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Metric registration or gathering failed.
    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Text exposition produced invalid UTF-8.
    #[error("metrics exposition is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// The tracer provider reported a flush or shutdown failure.
    #[error("span pipeline error: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    /// The blocking flush task was cancelled or panicked.
    #[error("span pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The tracer provider did not finish a flush in time.
    #[error("span pipeline did not finish {operation} within {timeout:?}")]
    Timeout {
        /// Operation that timed out (`flush` or `shutdown`).
        operation: &'static str,
        /// Bound that was exceeded.
        timeout: Duration,
    },
}

/// Fatal failure of a background loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// An iteration panicked; the loop stops at that iteration.
    #[error("iteration {iteration} panicked: {message}")]
    Panicked {
        /// Last iteration number started by the loop.
        iteration: u64,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl WorkerError {
    /// Build a `Panicked` error from a `catch_unwind` payload.
    pub fn from_panic(iteration: u64, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked { iteration, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_str() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = WorkerError::from_panic(7, payload.as_ref());
        assert_eq!(err.to_string(), "iteration 7 panicked: boom");
    }

    #[test]
    fn test_panic_payload_string() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("kaboom"));
        let WorkerError::Panicked { iteration, message } =
            WorkerError::from_panic(3, payload.as_ref());
        assert_eq!(iteration, 3);
        assert_eq!(message, "kaboom");
    }

    #[test]
    fn test_panic_payload_other() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        let err = WorkerError::from_panic(1, payload.as_ref());
        assert!(err.to_string().contains("non-string panic payload"));
    }
}
