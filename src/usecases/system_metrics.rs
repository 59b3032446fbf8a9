//! System Metrics Simulator - Fake CPU and Memory Gauges
//!
//! Every 5 seconds draws a CPU percentage in [10, 90] and a memory
//! figure in [100 MB, 500 MB] and publishes them as gauges.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::domain::workload::{CPU_PERCENT, MEMORY_BYTES, SYSTEM_METRICS_INTERVAL};
use crate::ports::random::RandomSource;
use crate::telemetry::Telemetry;

use super::unix_seconds;

/// Worker name used in logs and supervisor gauges.
pub const METRICS_UPDATER: &str = "metrics_updater";

/// Periodic publisher of simulated resource usage.
pub struct SystemMetricsSimulator<R: RandomSource> {
    telemetry: Arc<Telemetry>,
    random: Arc<R>,
}

impl<R: RandomSource> SystemMetricsSimulator<R> {
    /// Create a simulator publishing into `telemetry`'s system gauges.
    pub fn new(telemetry: Arc<Telemetry>, random: Arc<R>) -> Self {
        Self { telemetry, random }
    }

    /// Draw and publish one sample. Returns `(cpu_percent, memory_bytes)`.
    pub fn update(&self) -> (f64, u64) {
        let cpu_percent = self.random.uniform(CPU_PERCENT);
        let memory_bytes = self.random.integer(MEMORY_BYTES);
        self.telemetry
            .metrics
            .set_system_usage(cpu_percent, memory_bytes);

        debug!(
            component = METRICS_UPDATER,
            cpu_percent = round2(cpu_percent),
            memory_bytes,
            "Updated simulated metrics"
        );
        (cpu_percent, memory_bytes)
    }

    /// Publish a sample immediately, then every 5 seconds until shutdown.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(component = METRICS_UPDATER, "Starting system metrics updater");

        let mut ticker = tokio::time::interval(SYSTEM_METRICS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(component = METRICS_UPDATER, "Shutdown signal received in metrics updater");
                    return;
                }
                _ = ticker.tick() => {
                    self.update();
                    self.telemetry
                        .metrics
                        .record_worker_iteration(METRICS_UPDATER, unix_seconds());
                }
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
