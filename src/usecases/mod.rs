//! Use Cases Layer - Application Logic
//!
//! Orchestrates the telemetry context with the random-source port to
//! implement the generator's workflows.
//!
//! Use cases:
//! - `Workload`: one simulated item, nested spans plus metrics
//! - `TraceWorker`: main operation loop, one trace per second
//! - `SystemMetricsSimulator`: simulated CPU / memory gauges
//! - `TaskSupervisor`: spawns the loops and tracks their liveness
//! - `RunningApp`: signal handling and the bounded shutdown sequence

pub mod lifecycle;
pub mod supervisor;
pub mod system_metrics;
pub mod trace_worker;
pub mod workload;

pub use lifecycle::{RunningApp, shutdown_signal};
pub use supervisor::TaskSupervisor;
pub use system_metrics::SystemMetricsSimulator;
pub use trace_worker::TraceWorker;
pub use workload::Workload;

use chrono::Utc;

/// Current Unix time in seconds, millisecond resolution.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn unix_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1_000.0
}
