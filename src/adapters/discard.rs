//! Discarding span exporter, used when OTLP export is disabled.
//!
//! Spans are still sampled and carry real ids (so logs stay
//! correlated); finished batches are dropped.

use futures_util::future::BoxFuture;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};

/// Accepts every batch and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardExporter;

impl SpanExporter for DiscardExporter {
    fn export(&mut self, _batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        Box::pin(std::future::ready(Ok(())))
    }
}
