//! Prometheus Metrics Registry - Demo Application Instruments
//!
//! Registers every instrument once at startup. Names and label sets
//! match what dashboards scrape, so they must not change:
//! - `app_requests_total{method,endpoint,status}` (counter)
//! - `app_items_processed_total` (counter)
//! - `app_active_operations` (gauge)
//! - `app_processing_duration_seconds` (histogram)
//! - `app_request_latency_seconds` (summary)
//! - `app_cpu_usage_percent`, `app_memory_usage_bytes` (gauges)
//! - `app_errors_total{error_type}` (counter)
//! - `app_worker_alive{worker}`, `app_worker_last_iteration_timestamp_seconds{worker}` (gauges)

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::domain::workload::ErrorType;
use crate::error::TelemetryError;

use super::summary::Summary;

/// Histogram buckets of `app_processing_duration_seconds`.
pub const PROCESSING_BUCKETS: [f64; 9] = [0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0];

/// Background loops tracked by the worker gauges.
pub const WORKER_NAMES: [&str; 2] = ["trace_worker", "metrics_updater"];

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Centralized Prometheus metrics for the demo application.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// HTTP requests served, by method/endpoint/status.
    pub requests_total: IntCounterVec,
    /// Items processed successfully.
    pub items_processed: IntCounter,
    /// Items currently being processed.
    pub active_operations: IntGauge,
    /// Processing time per item (histogram).
    pub processing_duration: Histogram,
    /// Processing time per item (summary).
    pub request_latency: Summary,
    /// Simulated CPU usage.
    pub cpu_usage: Gauge,
    /// Simulated memory usage.
    pub memory_usage: Gauge,
    /// Errors by type.
    pub errors_total: IntCounterVec,
    /// 1 while a background loop runs, 0 once it has exited.
    pub worker_alive: GaugeVec,
    /// Unix time of a loop's last completed iteration.
    pub worker_last_iteration: GaugeVec,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("items_processed", &self.items_processed.get())
            .field("active_operations", &self.active_operations.get())
            .finish_non_exhaustive()
    }
}

impl MetricsRegistry {
    /// Create and register all metrics.
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("app_requests_total", "Total number of requests processed"),
            &["method", "endpoint", "status"],
        )?;

        let items_processed =
            IntCounter::new("app_items_processed_total", "Total number of items processed")?;

        let active_operations =
            IntGauge::new("app_active_operations", "Number of currently active operations")?;

        let processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "app_processing_duration_seconds",
                "Time spent processing items",
            )
            .buckets(PROCESSING_BUCKETS.to_vec()),
        )?;

        let request_latency =
            Summary::new("app_request_latency_seconds", "Request latency in seconds")?;

        let cpu_usage = Gauge::new("app_cpu_usage_percent", "Simulated CPU usage percentage")?;

        let memory_usage =
            Gauge::new("app_memory_usage_bytes", "Simulated memory usage in bytes")?;

        let errors_total = IntCounterVec::new(
            Opts::new("app_errors_total", "Total number of errors"),
            &["error_type"],
        )?;

        let worker_alive = GaugeVec::new(
            Opts::new(
                "app_worker_alive",
                "Whether a background loop is running (1=running, 0=stopped)",
            ),
            &["worker"],
        )?;

        let worker_last_iteration = GaugeVec::new(
            Opts::new(
                "app_worker_last_iteration_timestamp_seconds",
                "Unix time of the last completed iteration of a background loop",
            ),
            &["worker"],
        )?;

        // Register all metrics
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(items_processed.clone()))?;
        registry.register(Box::new(active_operations.clone()))?;
        registry.register(Box::new(processing_duration.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(cpu_usage.clone()))?;
        registry.register(Box::new(memory_usage.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(worker_alive.clone()))?;
        registry.register(Box::new(worker_last_iteration.clone()))?;

        // Known series start at zero so rate() works from the first scrape.
        requests_total.with_label_values(&["GET", "/", "200"]);
        for error_type in ErrorType::ALL {
            errors_total.with_label_values(&[error_type.as_label()]);
        }
        for worker in WORKER_NAMES {
            worker_alive.with_label_values(&[worker]);
            worker_last_iteration.with_label_values(&[worker]);
        }

        Ok(Self {
            registry,
            requests_total,
            items_processed,
            active_operations,
            processing_duration,
            request_latency,
            cpu_usage,
            memory_usage,
            errors_total,
            worker_alive,
            worker_last_iteration,
        })
    }

    /// Count one served HTTP request.
    pub fn record_request(&self, method: &str, endpoint: &str, status: &str) {
        self.requests_total
            .with_label_values(&[method, endpoint, status])
            .inc();
    }

    /// Count one error of the given type.
    pub fn record_error(&self, error_type: ErrorType) {
        self.errors_total
            .with_label_values(&[error_type.as_label()])
            .inc();
    }

    /// Current value of `app_errors_total{error_type}`.
    pub fn errors(&self, error_type: ErrorType) -> u64 {
        self.errors_total
            .with_label_values(&[error_type.as_label()])
            .get()
    }

    /// Record one processing duration into both the histogram and the summary.
    pub fn observe_processing(&self, seconds: f64) {
        self.processing_duration.observe(seconds);
        self.request_latency.observe(seconds);
    }

    /// Set the simulated resource gauges.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_system_usage(&self, cpu_percent: f64, memory_bytes: u64) {
        self.cpu_usage.set(cpu_percent);
        self.memory_usage.set(memory_bytes as f64);
    }

    /// Mark a background loop as running or stopped.
    pub fn set_worker_alive(&self, worker: &str, alive: bool) {
        self.worker_alive
            .with_label_values(&[worker])
            .set(if alive { 1.0 } else { 0.0 });
    }

    /// Whether a background loop is marked as running.
    pub fn is_worker_alive(&self, worker: &str) -> bool {
        self.worker_alive.with_label_values(&[worker]).get() > 0.0
    }

    /// Record the completion time of a loop iteration (Unix seconds).
    pub fn record_worker_iteration(&self, worker: &str, unix_seconds: f64) {
        self.worker_last_iteration
            .with_label_values(&[worker])
            .set(unix_seconds);
    }

    /// Render all metrics in the Prometheus text exposition format.
    ///
    /// The whole document is encoded into one buffer before it is
    /// returned, so concurrent writers never produce a partial scrape.
    pub fn render(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
