//! Structured Logging - JSON Lines Correlated with Trace Spans
//!
//! `CorrelatedJsonLayer` writes one JSON object per event:
//!
//! ```text
//! {"timestamp":"2026-01-01T00:00:00.000000Z","name":"trace_test_app::usecases::workload",
//!  "levelname":"INFO","message":"...","k8s_node_name":"node-a",
//!  "trace_id":"<32 hex>","span_id":"<16 hex>", ...event fields}
//! ```
//!
//! `trace_id`/`span_id` come from the innermost `tracing` span in scope
//! that recorded both fields. `telemetry::tracer::Span::in_scope` enters
//! such a span, so every record logged inside it is joinable to the trace.

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

/// Trace identifiers attached to a `tracing` span's extensions.
#[derive(Debug, Clone, Default)]
struct SpanCorrelation {
    trace_id: Option<String>,
    span_id: Option<String>,
}

impl SpanCorrelation {
    fn is_complete(&self) -> bool {
        self.trace_id.is_some() && self.span_id.is_some()
    }
}

impl Visit for SpanCorrelation {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "trace_id" => self.trace_id = Some(value.to_string()),
            "span_id" => self.span_id = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "trace_id" => self.trace_id = Some(format!("{value:?}")),
            "span_id" => self.span_id = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

/// Collects event fields into a JSON map.
struct JsonVisitor<'a> {
    fields: &'a mut Map<String, Value>,
}

impl Visit for JsonVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.fields.insert(field.name().to_string(), value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields
            .insert(field.name().to_string(), Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), Value::from(format!("{value:?}")));
    }
}

/// Layer rendering events as correlated JSON lines.
pub struct CorrelatedJsonLayer<W> {
    node_name: String,
    make_writer: W,
}

impl<W> CorrelatedJsonLayer<W>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    /// Create a layer stamping `node_name` and writing to `make_writer`.
    pub fn new(node_name: impl Into<String>, make_writer: W) -> Self {
        Self {
            node_name: node_name.into(),
            make_writer,
        }
    }

    fn render<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> String
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let metadata = event.metadata();
        let mut fields = Map::new();

        fields.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        fields.insert("name".to_string(), Value::from(metadata.target()));
        fields.insert(
            "levelname".to_string(),
            Value::from(metadata.level().as_str()),
        );
        fields.insert("message".to_string(), Value::from(""));
        fields.insert("k8s_node_name".to_string(), Value::from(self.node_name.as_str()));

        if let Some(correlation) = current_correlation(event, ctx) {
            if let Some(trace_id) = correlation.trace_id {
                fields.insert("trace_id".to_string(), Value::from(trace_id));
            }
            if let Some(span_id) = correlation.span_id {
                fields.insert("span_id".to_string(), Value::from(span_id));
            }
        }

        event.record(&mut JsonVisitor {
            fields: &mut fields,
        });

        let mut line = serde_json::to_string(&Value::Object(fields))
            .unwrap_or_else(|e| format!(r#"{{"levelname":"ERROR","message":"unserializable log record: {e}"}}"#));
        line.push('\n');
        line
    }
}

/// Innermost span in the event's scope carrying both trace identifiers.
fn current_correlation<S>(event: &Event<'_>, ctx: &Context<'_, S>) -> Option<SpanCorrelation>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let scope = ctx.event_scope(event)?;
    for span in scope {
        if let Some(correlation) = span.extensions().get::<SpanCorrelation>() {
            if correlation.is_complete() {
                return Some(correlation.clone());
            }
        }
    }
    None
}

impl<S, W> Layer<S> for CorrelatedJsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut correlation = SpanCorrelation::default();
        attrs.record(&mut correlation);
        if correlation.trace_id.is_none() && correlation.span_id.is_none() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(correlation);
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(correlation) = extensions.get_mut::<SpanCorrelation>() {
            values.record(correlation);
        } else {
            let mut correlation = SpanCorrelation::default();
            values.record(&mut correlation);
            if correlation.trace_id.is_some() || correlation.span_id.is_some() {
                extensions.insert(correlation);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let line = self.render(event, &ctx);
        let mut writer = self.make_writer.make_writer();
        let _ = writer.write_all(line.as_bytes());
    }
}

/// Install the global subscriber for the configured format.
///
/// `RUST_LOG` takes precedence over `logging.level`.
///
/// # Errors
/// Fails if the filter is invalid or a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(CorrelatedJsonLayer::new(config.node_name.clone(), std::io::stdout))
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?,
    }

    Ok(())
}
