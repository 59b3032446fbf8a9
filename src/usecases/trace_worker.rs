//! Trace Worker - Main Operation Loop
//!
//! Produces one `main_operation` trace per second, each wrapping a
//! `process_item` call. Event-driven shutdown via `tokio::select!` on
//! the broadcast channel, observed during the inter-iteration sleep.
//!
//! A panic inside an iteration is caught, logged and counted as a
//! `worker_error`; it ends the loop (restart is the supervisor's call).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::domain::workload::{ErrorType, ITERATION_DELAY, USER_IDS, user_id};
use crate::error::WorkerError;
use crate::ports::random::RandomSource;
use crate::telemetry::{Telemetry, counter_value};

use super::unix_seconds;
use super::workload::Workload;

/// Worker name used in logs and supervisor gauges.
pub const TRACE_WORKER: &str = "trace_worker";

/// Outer loop emitting `main_operation` traces.
pub struct TraceWorker<R: RandomSource> {
    telemetry: Arc<Telemetry>,
    random: Arc<R>,
    workload: Workload<R>,
    /// Iterations started so far (also the item id of the latest one).
    iterations: AtomicU64,
}

impl<R: RandomSource> TraceWorker<R> {
    /// Create a worker sharing `telemetry` and `random` with its workload.
    pub fn new(telemetry: Arc<Telemetry>, random: Arc<R>) -> Self {
        let workload = Workload::new(Arc::clone(&telemetry), Arc::clone(&random));
        Self {
            telemetry,
            random,
            workload,
            iterations: AtomicU64::new(0),
        }
    }

    /// Number of iterations started.
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Run until shutdown is signalled or an iteration panics.
    ///
    /// # Errors
    /// Returns `WorkerError::Panicked` when an iteration panics.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), WorkerError> {
        info!(component = TRACE_WORKER, "Trace worker started");

        loop {
            let iteration = self.iterations.fetch_add(1, Ordering::Relaxed) + 1;

            let result = AssertUnwindSafe(self.run_iteration(iteration))
                .catch_unwind()
                .await;

            if let Err(payload) = result {
                let err = WorkerError::from_panic(iteration, payload.as_ref());
                let WorkerError::Panicked { message, .. } = &err;
                error!(
                    component = TRACE_WORKER,
                    error_type = %ErrorType::Worker,
                    error_message = %message,
                    iteration,
                    "Error in trace worker"
                );
                self.telemetry.metrics.record_error(ErrorType::Worker);
                return Err(err);
            }

            self.telemetry
                .metrics
                .record_worker_iteration(TRACE_WORKER, unix_seconds());

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(component = TRACE_WORKER, iteration, "Shutdown signal received in trace worker");
                    return Ok(());
                }
                () = tokio::time::sleep(ITERATION_DELAY) => {}
            }
        }
    }

    async fn run_iteration(&self, iteration: u64) {
        let user = user_id(self.random.integer(USER_IDS));
        let environment = self.telemetry.environment.as_str();

        let mut span = self.telemetry.tracer.start_span("main_operation");
        span.set_attribute("iteration", counter_value(iteration));

        span.in_scope(|| {
            info!(
                component = TRACE_WORKER,
                iteration,
                user_id = %user,
                environment,
                "Processing item in main operation"
            );
        });

        self.workload.process_item(Some(&span), iteration).await;

        span.set_attribute("environment", environment.to_string());
        span.set_attribute("user.id", user);
        span.end();
    }
}
