//! Tracer - Explicit Span Handles with Borrow-checked Nesting
//!
//! Thin layer over the OpenTelemetry SDK tracer. Spans are started from
//! the `Tracer` (roots) or from a parent `Span` (children). A child
//! borrows its parent, so the parent cannot end while a child is open
//! and every child interval sits inside its parent's. There is no
//! ambient "current span": a child is started with
//! `start_with_context` on a context built from its parent's
//! `SpanContext`.
//!
//! Each span also owns a `tracing` span carrying `trace_id`/`span_id`.
//! `Span::in_scope` enters it so log records emitted inside pick up the
//! identifiers (see `telemetry::logging`).

use std::borrow::Cow;
use std::marker::PhantomData;

use opentelemetry::trace::{
    Span as _, SpanContext, Status, TraceContextExt, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::trace::{self as sdktrace, TracerProvider};

/// Instrumentation scope name reported with every span.
const INSTRUMENTATION_SCOPE: &str = env!("CARGO_PKG_NAME");

/// Creates spans on top of an SDK tracer provider.
#[derive(Clone)]
pub struct Tracer {
    inner: sdktrace::Tracer,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("scope", &INSTRUMENTATION_SCOPE)
            .finish()
    }
}

impl Tracer {
    /// Create a tracer bound to `provider`'s processors and resource.
    pub fn new(provider: &TracerProvider) -> Self {
        Self {
            inner: provider.tracer(INSTRUMENTATION_SCOPE),
        }
    }

    /// Start a root span with a fresh trace id.
    pub fn start_span(&self, name: impl Into<Cow<'static, str>>) -> Span<'static> {
        Span::open(self.clone(), name.into(), &Context::new())
    }
}

/// An open span. Ends on `end()` or when dropped.
///
/// The lifetime ties a child to the parent it was started from.
pub struct Span<'parent> {
    tracer: Tracer,
    inner: sdktrace::Span,
    correlation: tracing::Span,
    _parent: PhantomData<&'parent ()>,
}

impl std::fmt::Debug for Span<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span")
            .field("context", self.inner.span_context())
            .finish_non_exhaustive()
    }
}

impl<'parent> Span<'parent> {
    fn open(tracer: Tracer, name: Cow<'static, str>, parent: &Context) -> Self {
        let inner = tracer.inner.start_with_context(name.clone(), parent);
        let context = inner.span_context();
        // ERROR level keeps the correlation span enabled under any log filter.
        let correlation = tracing::error_span!(
            target: "trace_test_app::span",
            "span",
            otel.name = %name,
            trace_id = %context.trace_id(),
            span_id = %context.span_id(),
        );

        Self {
            tracer,
            inner,
            correlation,
            _parent: PhantomData,
        }
    }

    /// Start a child span in the same trace.
    pub fn child(&self, name: impl Into<Cow<'static, str>>) -> Span<'_> {
        let parent = Context::new().with_remote_span_context(self.context());
        Span::open(self.tracer.clone(), name.into(), &parent)
    }

    /// Trace and span id of this span.
    pub fn context(&self) -> SpanContext {
        self.inner.span_context().clone()
    }

    /// Set (or replace) an attribute.
    pub fn set_attribute(&mut self, key: &'static str, value: impl Into<Value>) {
        self.inner.set_attribute(KeyValue::new(key, value));
    }

    /// Set the final status.
    pub fn set_status(&mut self, status: Status) {
        self.inner.set_status(status);
    }

    /// Run `f` with this span as the logging scope.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.correlation.in_scope(f)
    }

    /// End the span and hand it to the provider's processors.
    pub fn end(mut self) {
        self.inner.end();
    }
}

/// Span attribute value for an unsigned counter.
pub fn counter_value(n: u64) -> Value {
    Value::I64(i64::try_from(n).unwrap_or(i64::MAX))
}
