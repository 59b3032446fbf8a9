//! Simulated Workload - "Process One Item" with Nested Spans
//!
//! One call produces the span tree
//!
//! ```text
//! process_data (item.id, processing.status)
//! ├── validate_data (validation.result = success)
//! └── store_data (storage.type = database)
//! ```
//!
//! plus correlated logs and metric updates. 5% of calls fail
//! validation; the failure is recorded, never propagated.
//!
//! `OperationGuard` owns the active-operations decrement and the
//! duration observation, so both happen on normal return, on panic
//! unwinding and when the future is dropped mid-flight.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::trace::Status;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::workload::{
    CHILD_STEP_SECS, ErrorType, PROCESSING_SECS, ProcessingOutcome,
};
use crate::ports::random::RandomSource;
use crate::telemetry::{Span, Telemetry, counter_value};

/// Scope guard for one `process_item` call.
///
/// Created on entry (increments `app_active_operations`); dropped on
/// exit (decrements it and records the elapsed time once into both the
/// histogram and the summary).
struct OperationGuard<'a> {
    metrics: &'a MetricsRegistry,
    started: Instant,
}

impl<'a> OperationGuard<'a> {
    fn start(metrics: &'a MetricsRegistry) -> Self {
        metrics.active_operations.inc();
        Self {
            metrics,
            started: Instant::now(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.metrics.active_operations.dec();
        self.metrics.observe_processing(self.elapsed_secs());
    }
}

/// Simulated item processor.
pub struct Workload<R: RandomSource> {
    /// Tracer and metrics.
    telemetry: Arc<Telemetry>,
    /// Source of durations and error draws.
    random: Arc<R>,
}

impl<R: RandomSource> Workload<R> {
    /// Create a workload on top of shared telemetry and a random source.
    pub fn new(telemetry: Arc<Telemetry>, random: Arc<R>) -> Self {
        Self { telemetry, random }
    }

    /// Process one item, nesting its spans under `parent` when given.
    ///
    /// Never fails: the simulated validation error is reported through
    /// the returned outcome, the error counter, the span and the log.
    pub async fn process_item(&self, parent: Option<&Span<'_>>, item_id: u64) -> ProcessingOutcome {
        let metrics = self.telemetry.metrics.as_ref();
        let guard = OperationGuard::start(metrics);

        let mut span = match parent {
            Some(parent) => parent.child("process_data"),
            None => self.telemetry.tracer.start_span("process_data"),
        };
        span.set_attribute("item.id", counter_value(item_id));

        span.in_scope(|| {
            let ctx = span.context();
            debug!(
                item_id,
                operation = "process_data",
                trace_id = %ctx.trace_id(),
                span_id = %ctx.span_id(),
                "Starting data processing"
            );
        });

        self.pause(self.random.uniform(PROCESSING_SECS)).await;

        {
            let mut validate = span.child("validate_data");
            validate.set_attribute("validation.result", "success");
            validate.in_scope(|| {
                debug!(
                    item_id,
                    operation = "validate_data",
                    validation_result = "success",
                    "Validating data"
                );
            });
            self.pause(self.random.uniform(CHILD_STEP_SECS)).await;
            validate.end();
        }

        {
            let mut store = span.child("store_data");
            store.set_attribute("storage.type", "database");
            store.in_scope(|| {
                debug!(
                    item_id,
                    operation = "store_data",
                    storage_type = "database",
                    "Storing data"
                );
            });
            self.pause(self.random.uniform(CHILD_STEP_SECS)).await;
            store.end();
        }

        let outcome = ProcessingOutcome::from_draw(self.random.probability());
        span.set_attribute("processing.status", outcome.status_label());

        match outcome {
            ProcessingOutcome::Failed(error_type) => {
                span.set_status(Status::error(error_type.to_string()));
                metrics.record_error(error_type);
                span.in_scope(|| {
                    error!(
                        item_id,
                        operation = "process_data",
                        error_type = %error_type,
                        processing_status = outcome.status_label(),
                        "Data processing failed"
                    );
                });
            }
            ProcessingOutcome::Completed => {
                metrics.items_processed.inc();
                span.in_scope(|| {
                    info!(
                        item_id,
                        operation = "process_data",
                        processing_status = outcome.status_label(),
                        duration_seconds = guard.elapsed_secs(),
                        "Data processing completed successfully"
                    );
                });
            }
        }

        span.end();
        drop(guard);

        outcome
    }

    async fn pause(&self, seconds: f64) {
        tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::Value;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use opentelemetry_sdk::trace::TracerProvider;

    use super::*;
    use crate::ports::random::MockRandomSource;

    fn random_with_draw(p: f64) -> MockRandomSource {
        let mut random = MockRandomSource::new();
        random.expect_probability().return_const(p);
        random
            .expect_uniform()
            .returning(|range| *range.start());
        random
    }

    fn telemetry() -> (Arc<Telemetry>, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (Arc::new(Telemetry::new(provider, "test").unwrap()), exporter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_branch() {
        let (telemetry, exporter) = telemetry();
        let workload = Workload::new(Arc::clone(&telemetry), Arc::new(random_with_draw(0.0)));

        let outcome = workload.process_item(None, 1).await;

        assert_eq!(outcome, ProcessingOutcome::Failed(ErrorType::Validation));
        assert_eq!(telemetry.metrics.errors(ErrorType::Validation), 1);
        assert_eq!(telemetry.metrics.items_processed.get(), 0);

        let spans = exporter.get_finished_spans().unwrap();
        let root = spans.iter().find(|s| s.name == "process_data").unwrap();
        assert!(matches!(root.status, Status::Error { .. }));
        let status = root
            .attributes
            .iter()
            .find(|kv| kv.key.as_str() == "processing.status")
            .map(|kv| kv.value.clone());
        assert_eq!(status, Some(Value::from("error")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nests_under_given_parent() {
        let (telemetry, exporter) = telemetry();
        let workload = Workload::new(Arc::clone(&telemetry), Arc::new(random_with_draw(1.0)));

        let parent = telemetry.tracer.start_span("main_operation");
        let parent_ctx = parent.context();
        workload.process_item(Some(&parent), 5).await;
        parent.end();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 4);
        assert!(spans
            .iter()
            .all(|s| s.span_context.trace_id() == parent_ctx.trace_id()));
        let process = spans.iter().find(|s| s.name == "process_data").unwrap();
        assert_eq!(process.parent_span_id, parent_ctx.span_id());
        for step in ["validate_data", "store_data"] {
            let child = spans.iter().find(|s| s.name == step).unwrap();
            assert_eq!(child.parent_span_id, process.span_context.span_id());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_branch() {
        let (telemetry, _exporter) = telemetry();
        let workload = Workload::new(Arc::clone(&telemetry), Arc::new(random_with_draw(1.0)));

        let outcome = workload.process_item(None, 2).await;

        assert_eq!(outcome, ProcessingOutcome::Completed);
        assert_eq!(telemetry.metrics.items_processed.get(), 1);
        assert_eq!(telemetry.metrics.errors(ErrorType::Validation), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_restores_gauge_and_records_duration() {
        let (telemetry, _exporter) = telemetry();
        let workload = Workload::new(Arc::clone(&telemetry), Arc::new(random_with_draw(1.0)));

        workload.process_item(None, 3).await;

        let metrics = &telemetry.metrics;
        assert_eq!(metrics.active_operations.get(), 0);
        assert_eq!(metrics.processing_duration.get_sample_count(), 1);
        // Minimum draws: 0.1 + 0.05 + 0.05 seconds of virtual time.
        let sum = metrics.processing_duration.get_sample_sum();
        assert!((0.2..0.21).contains(&sum), "unexpected duration {sum}");
        assert!((metrics.request_latency.get_sample_sum() - sum).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_still_releases_gauge() {
        let (telemetry, _exporter) = telemetry();
        let workload = Workload::new(Arc::clone(&telemetry), Arc::new(random_with_draw(1.0)));

        let result =
            tokio::time::timeout(Duration::from_millis(50), workload.process_item(None, 4)).await;

        assert!(result.is_err());
        assert_eq!(telemetry.metrics.active_operations.get(), 0);
        assert_eq!(telemetry.metrics.processing_duration.get_sample_count(), 1);
        assert_eq!(telemetry.metrics.items_processed.get(), 0);
    }
}
