//! Task Supervisor - Lifecycle Management for Background Loops
//!
//! Spawns the trace worker and the system metrics updater as separate
//! tokio tasks and publishes their liveness through the
//! `app_worker_alive{worker}` gauge. A trace worker that ends with an
//! error is restarted after a 1 s pause only when `restart_on_fault`
//! is set; otherwise it stays dead and the loss is logged at error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::SupervisorConfig;
use crate::ports::random::RandomSource;
use crate::telemetry::Telemetry;

use super::system_metrics::{METRICS_UPDATER, SystemMetricsSimulator};
use super::trace_worker::{TRACE_WORKER, TraceWorker};

/// Pause before a faulted loop is started again.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Supervises the background telemetry loops.
pub struct TaskSupervisor<R: RandomSource> {
    /// Shared telemetry (for the liveness gauges).
    telemetry: Arc<Telemetry>,
    /// Trace worker instance.
    trace_worker: Arc<TraceWorker<R>>,
    /// System metrics updater instance.
    metrics_updater: Arc<SystemMetricsSimulator<R>>,
    /// Restart a loop that ended with an error.
    restart_on_fault: bool,
    /// Shutdown broadcaster.
    shutdown_tx: broadcast::Sender<()>,
}

impl<R: RandomSource> TaskSupervisor<R> {
    /// Create a supervisor over both loops, sharing `random` between them.
    pub fn new(
        telemetry: Arc<Telemetry>,
        random: Arc<R>,
        config: &SupervisorConfig,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            trace_worker: Arc::new(TraceWorker::new(Arc::clone(&telemetry), Arc::clone(&random))),
            metrics_updater: Arc::new(SystemMetricsSimulator::new(Arc::clone(&telemetry), random)),
            telemetry,
            restart_on_fault: config.restart_on_fault,
            shutdown_tx,
        }
    }

    /// Get the shared trace worker (iteration count).
    pub fn trace_worker(&self) -> Arc<TraceWorker<R>> {
        Arc::clone(&self.trace_worker)
    }

    /// Spawn both loops and return their join handles.
    ///
    /// Every handle completes once shutdown is broadcast, or earlier if
    /// its loop dies and is not restarted.
    #[instrument(skip(self))]
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);

        // Trace worker
        {
            let worker = Arc::clone(&self.trace_worker);
            let telemetry = Arc::clone(&self.telemetry);
            let shutdown_tx = self.shutdown_tx.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let restart_on_fault = self.restart_on_fault;

            handles.push(tokio::spawn(async move {
                loop {
                    telemetry.metrics.set_worker_alive(TRACE_WORKER, true);
                    let result = worker.run(shutdown_tx.subscribe()).await;
                    telemetry.metrics.set_worker_alive(TRACE_WORKER, false);

                    match result {
                        Ok(()) => {
                            info!(worker = TRACE_WORKER, "Trace worker exited normally");
                            return;
                        }
                        Err(e) if restart_on_fault => {
                            warn!(
                                worker = TRACE_WORKER,
                                error = %e,
                                delay_ms = RESTART_DELAY.as_millis(),
                                "Trace worker crashed, restarting"
                            );
                            tokio::select! {
                                _ = shutdown_rx.recv() => return,
                                () = tokio::time::sleep(RESTART_DELAY) => {}
                            }
                        }
                        Err(e) => {
                            error!(
                                worker = TRACE_WORKER,
                                error = %e,
                                "Trace worker stopped and will not be restarted"
                            );
                            return;
                        }
                    }
                }
            }));
        }

        // System metrics updater
        {
            let updater = Arc::clone(&self.metrics_updater);
            let telemetry = Arc::clone(&self.telemetry);
            let shutdown_rx = self.shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                telemetry.metrics.set_worker_alive(METRICS_UPDATER, true);
                updater.run(shutdown_rx).await;
                telemetry.metrics.set_worker_alive(METRICS_UPDATER, false);
                info!(worker = METRICS_UPDATER, "Metrics updater exited normally");
            }));
        }

        info!(task_count = handles.len(), "Background tasks spawned");
        handles
    }

    /// Whether every supervised loop is currently running.
    pub fn is_fully_healthy(&self) -> bool {
        self.telemetry.metrics.is_worker_alive(TRACE_WORKER)
            && self.telemetry.metrics.is_worker_alive(METRICS_UPDATER)
    }
}

#[cfg(test)]
mod tests {
    use std::ops::RangeInclusive;
    use std::sync::atomic::{AtomicU64, Ordering};

    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use opentelemetry_sdk::trace::TracerProvider;

    use super::*;
    use crate::domain::workload::{ErrorType, USER_IDS};

    /// Panics on the first user-id draw, behaves afterwards.
    #[derive(Default)]
    struct FaultOnce {
        user_draws: AtomicU64,
    }

    impl RandomSource for FaultOnce {
        fn probability(&self) -> f64 {
            1.0
        }

        fn uniform(&self, range: RangeInclusive<f64>) -> f64 {
            *range.start()
        }

        fn integer(&self, range: RangeInclusive<u64>) -> u64 {
            if range == USER_IDS && self.user_draws.fetch_add(1, Ordering::Relaxed) == 0 {
                panic!("first draw fails");
            }
            *range.start()
        }
    }

    fn supervisor(
        restart_on_fault: bool,
    ) -> (TaskSupervisor<FaultOnce>, Arc<Telemetry>, broadcast::Sender<()>) {
        let provider = TracerProvider::builder()
            .with_simple_exporter(InMemorySpanExporter::default())
            .build();
        let telemetry = Arc::new(Telemetry::new(provider, "test").unwrap());
        let (shutdown_tx, _) = broadcast::channel(4);
        let supervisor = TaskSupervisor::new(
            Arc::clone(&telemetry),
            Arc::new(FaultOnce::default()),
            &SupervisorConfig { restart_on_fault },
            shutdown_tx.clone(),
        );
        (supervisor, telemetry, shutdown_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_worker_is_not_restarted_by_default() {
        let (supervisor, telemetry, shutdown_tx) = supervisor(false);
        let mut handles = supervisor.spawn();

        // Trace worker handle finishes on its own.
        handles.remove(0).await.unwrap();

        assert!(!telemetry.metrics.is_worker_alive(TRACE_WORKER));
        assert!(telemetry.metrics.is_worker_alive(METRICS_UPDATER));
        assert!(!supervisor.is_fully_healthy());
        assert_eq!(telemetry.metrics.errors(ErrorType::Worker), 1);

        shutdown_tx.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(!telemetry.metrics.is_worker_alive(METRICS_UPDATER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_on_fault() {
        let (supervisor, telemetry, shutdown_tx) = supervisor(true);
        let handles = supervisor.spawn();

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(telemetry.metrics.is_worker_alive(TRACE_WORKER));
        assert!(supervisor.is_fully_healthy());
        assert_eq!(telemetry.metrics.errors(ErrorType::Worker), 1);
        assert!(telemetry.metrics.items_processed.get() >= 2);

        shutdown_tx.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(!telemetry.metrics.is_worker_alive(TRACE_WORKER));
    }
}
