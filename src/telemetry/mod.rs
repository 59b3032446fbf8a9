//! Telemetry Context - Tracer, Metrics and Logging Plumbing
//!
//! `Telemetry` bundles the OpenTelemetry tracer provider and the metrics
//! registry into one explicitly constructed object that every loop
//! receives as an `Arc`. Nothing is installed in the OpenTelemetry
//! globals; only the `tracing` dispatcher (installed by
//! `logging::init_logging`) stays process-global.

pub mod logging;
pub mod tracer;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::{BatchConfig, BatchConfigBuilder, BatchSpanProcessor, Config, TracerProvider};
use opentelemetry_sdk::{Resource, runtime};
use tokio::time::Instant;
use tracing::warn;

use crate::adapters::discard::DiscardExporter;
use crate::adapters::metrics::MetricsRegistry;
use crate::adapters::otlp;
use crate::config::{AppConfig, ExporterConfig, ServiceConfig};
use crate::error::TelemetryError;

pub use tracer::{Span, Tracer, counter_value};

/// Shared telemetry handles for one process.
#[derive(Debug)]
pub struct Telemetry {
    /// Span factory bound to `provider`.
    pub tracer: Tracer,
    /// Prometheus instruments.
    pub metrics: Arc<MetricsRegistry>,
    /// Value of the `environment` span attribute.
    pub environment: String,
    provider: TracerProvider,
}

impl Telemetry {
    /// Wire a tracer on top of `provider` and a fresh metrics registry.
    pub fn new(
        provider: TracerProvider,
        environment: impl Into<String>,
    ) -> Result<Self, TelemetryError> {
        Ok(Self {
            tracer: Tracer::new(&provider),
            metrics: Arc::new(MetricsRegistry::new()?),
            environment: environment.into(),
            provider,
        })
    }

    /// Build the telemetry context described by `config`.
    ///
    /// Must be called inside a tokio runtime when export is enabled
    /// (the batch processor spawns its task there).
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let provider = build_tracer_provider(config)?;
        Ok(Self::new(provider, config.service.environment.clone())?)
    }

    /// Export every span ended so far, giving up at `deadline`.
    ///
    /// # Errors
    /// `Timeout` past the deadline, `Trace` if a processor failed.
    pub async fn force_flush(&self, deadline: Instant) -> Result<(), TelemetryError> {
        let provider = self.provider.clone();
        let results = until_deadline("flush", deadline, move || provider.force_flush()).await?;
        results.into_iter().try_for_each(|r| r.map_err(TelemetryError::from))
    }

    /// Flush pending batches and stop every processor, giving up at
    /// `deadline`. Spans ended afterwards are not exported.
    ///
    /// # Errors
    /// `Timeout` past the deadline, `Trace` if a processor failed.
    pub async fn shutdown(&self, deadline: Instant) -> Result<(), TelemetryError> {
        let provider = self.provider.clone();
        until_deadline("shutdown", deadline, move || provider.shutdown()).await??;
        Ok(())
    }
}

/// The SDK flushes synchronously; run it off the async workers so the
/// batch task can make progress, and stop waiting at `deadline`.
async fn until_deadline<T, F>(
    operation: &'static str,
    deadline: Instant,
    f: F,
) -> Result<T, TelemetryError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let started = Instant::now();
    match tokio::time::timeout_at(deadline, tokio::task::spawn_blocking(f)).await {
        Ok(joined) => Ok(joined?),
        Err(_) => Err(TelemetryError::Timeout {
            operation,
            timeout: deadline.saturating_duration_since(started),
        }),
    }
}

/// Tracer provider for `config`: batch export over OTLP/HTTP when
/// enabled, a discarding exporter otherwise.
///
/// # Errors
/// Fails if the OTLP exporter cannot be built.
pub fn build_tracer_provider(config: &AppConfig) -> anyhow::Result<TracerProvider> {
    let builder = TracerProvider::builder()
        .with_config(Config::default().with_resource(resource(&config.service)));

    let provider = if config.exporter.enabled {
        let exporter =
            otlp::build_span_exporter(&config.exporter).context("Failed to build OTLP exporter")?;
        let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
            .with_batch_config(batch_config(&config.exporter))
            .build();
        builder.with_span_processor(processor).build()
    } else {
        builder.with_simple_exporter(DiscardExporter).build()
    };

    Ok(provider)
}

/// `service.name` / `service.version` resource attributes.
pub fn resource(service: &ServiceConfig) -> Resource {
    Resource::new([
        KeyValue::new("service.name", service.name.clone()),
        KeyValue::new("service.version", service.version.clone()),
    ])
}

/// Queue, batch and timer limits for the batch span processor.
pub fn batch_config(exporter: &ExporterConfig) -> BatchConfig {
    BatchConfigBuilder::default()
        .with_max_queue_size(exporter.max_queue_size)
        .with_max_export_batch_size(exporter.max_export_batch_size)
        .with_scheduled_delay(Duration::from_millis(exporter.scheduled_delay_ms))
        .with_max_export_timeout(Duration::from_millis(exporter.timeout_ms))
        .build()
}

/// Route OpenTelemetry SDK errors (failed exports, full queues) into
/// the structured log instead of raw stderr.
pub fn route_sdk_errors_to_logs() {
    let installed = opentelemetry::global::set_error_handler(|e| {
        warn!(error = %e, "OpenTelemetry error");
    });
    if let Err(e) = installed {
        warn!(error = %e, "Failed to install OpenTelemetry error handler");
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::Value;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;

    use super::*;

    #[test]
    fn test_resource_carries_service_identity() {
        let resource = resource(&ServiceConfig::default());
        assert_eq!(
            resource.get("service.name".into()),
            Some(Value::from("trace-test-app"))
        );
        assert_eq!(
            resource.get("service.version".into()),
            Some(Value::from("1.0.0"))
        );
    }

    #[tokio::test]
    async fn test_disabled_export_builds_without_collector() {
        let mut config = AppConfig::default();
        config.exporter.enabled = false;

        let telemetry = Telemetry::from_config(&config).unwrap();
        let span = telemetry.tracer.start_span("offline");
        assert!(span.context().is_valid());
        span.end();

        let deadline = Instant::now() + Duration::from_secs(1);
        telemetry.shutdown(deadline).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_force_flush_drains_batch_processor() {
        let exporter = InMemorySpanExporter::default();
        let mut limits = ExporterConfig::default();
        limits.scheduled_delay_ms = 3_600_000;
        let processor = BatchSpanProcessor::builder(exporter.clone(), runtime::Tokio)
            .with_batch_config(batch_config(&limits))
            .build();
        let provider = TracerProvider::builder()
            .with_span_processor(processor)
            .build();
        let telemetry = Telemetry::new(provider, "test").unwrap();

        telemetry.tracer.start_span("queued").end();
        assert!(exporter.get_finished_spans().unwrap().is_empty());

        let deadline = Instant::now() + Duration::from_secs(5);
        telemetry.force_flush(deadline).await.unwrap();
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
    }
}
