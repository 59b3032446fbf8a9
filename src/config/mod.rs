//! Configuration Module - TOML-based Application Configuration
//!
//! Loads configuration from an optional `config.toml`, then applies
//! environment overrides (`K8S_NODE_NAME`,
//! `OTEL_EXPORTER_OTLP_TRACES_ENDPOINT`). Every section has defaults,
//! so the application runs with no file at all.
//!
//! The simulated workload itself is not configurable: its ranges and
//! probabilities are constants in `domain::workload`.

pub mod loader;

use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Service identity (OTLP resource, log fields).
    pub service: ServiceConfig,
    /// HTTP surface.
    pub server: ServerConfig,
    /// Structured logging.
    pub logging: LoggingConfig,
    /// Span export pipeline.
    pub exporter: ExporterConfig,
    /// Background loop supervision.
    pub supervisor: SupervisorConfig,
    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// `service.name` resource attribute.
    pub name: String,
    /// `service.version` resource attribute.
    pub version: String,
    /// Value of the `environment` span attribute.
    pub environment: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for `/metrics`, `/health` and `/`.
    pub bind_address: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line (default, for the log pipeline).
    #[default]
    Json,
    /// Human-readable `tracing_subscriber::fmt` output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter (trace, debug, info, warn, error); `RUST_LOG` wins.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Kubernetes node name stamped on every record.
    pub node_name: String,
}

/// Span exporter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Send spans to the collector; when false they are kept in memory.
    pub enabled: bool,
    /// OTLP/HTTP traces URL.
    pub endpoint: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Spans buffered before new ones are dropped.
    pub max_queue_size: usize,
    /// Maximum spans per export request.
    pub max_export_batch_size: usize,
    /// Delay between timer-driven flushes in milliseconds.
    pub scheduled_delay_ms: u64,
}

/// Background loop supervision configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Restart a loop that stopped on a fault. Off by default: a dead
    /// worker stays dead and `app_worker_alive` drops to 0.
    pub restart_on_fault: bool,
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound for draining loops and flushing spans, in milliseconds.
    pub grace_period_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "trace-test-app".to_string(),
            version: "1.0.0".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            node_name: "unknown".to_string(),
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://alloy.alloy.svc:4318/v1/traces".to_string(),
            timeout_ms: 30_000,
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay_ms: 5_000,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 2_000,
        }
    }
}
