//! OTLP/HTTP Span Exporter
//!
//! Builds the `opentelemetry-otlp` HTTP exporter (protobuf body) for the
//! configured collector URL. The URL is the full traces endpoint and is
//! used as given, e.g. `http://alloy.alloy.svc:4318/v1/traces`.

use std::time::Duration;

use opentelemetry::trace::TraceError;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};

use crate::config::ExporterConfig;

/// Build the OTLP/HTTP exporter described by `config`.
///
/// # Errors
/// Fails if the endpoint is not a valid URI or the HTTP client cannot
/// be created.
pub fn build_span_exporter(config: &ExporterConfig) -> Result<SpanExporter, TraceError> {
    opentelemetry_otlp::new_exporter()
        .http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(config.endpoint.clone())
        .with_timeout(Duration::from_millis(config.timeout_ms))
        .build_span_exporter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builds_from_default_config() {
        assert!(build_span_exporter(&ExporterConfig::default()).is_ok());
    }
}
