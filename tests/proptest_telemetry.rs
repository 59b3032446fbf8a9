//! Property-Based Tests: Telemetry Invariants
//!
//! Uses `proptest` to verify that trace trees, outcomes and metric
//! instruments keep their invariants across random inputs.

use opentelemetry::trace::SpanId;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use proptest::prelude::*;

use trace_test_app::adapters::metrics::{MetricsRegistry, Summary};
use trace_test_app::adapters::random::ThreadRandom;
use trace_test_app::domain::workload::{ERROR_PROBABILITY, PROCESSING_SECS};
use trace_test_app::domain::{ErrorType, ProcessingOutcome};
use trace_test_app::ports::random::RandomSource;
use trace_test_app::telemetry::{Span, Tracer};

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

fn open_chain(parent: &Span<'_>, remaining: usize) {
    if remaining == 0 {
        return;
    }
    let child = parent.child("level");
    open_chain(&child, remaining - 1);
    child.end();
}

// ── Trace Tree Properties ───────────────────────────────────

proptest! {
    /// Nesting at any depth stays in one trace with a single root, each
    /// span parented on the one it was started from.
    #[test]
    fn nested_chain_stays_in_one_trace(depth in 0usize..12) {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = Tracer::new(&provider);

        let root = tracer.start_span("root");
        let root_ctx = root.context();
        open_chain(&root, depth);
        root.end();

        let spans = exporter.get_finished_spans().unwrap();
        prop_assert_eq!(spans.len(), depth + 1);
        let roots = spans.iter().filter(|s| s.parent_span_id == SpanId::INVALID).count();
        prop_assert_eq!(roots, 1);
        for span in &spans {
            prop_assert_eq!(span.span_context.trace_id(), root_ctx.trace_id());
            prop_assert!(is_lower_hex(&span.span_context.trace_id().to_string(), 32));
            prop_assert!(is_lower_hex(&span.span_context.span_id().to_string(), 16));
            if span.parent_span_id != SpanId::INVALID {
                let parent = spans
                    .iter()
                    .find(|p| p.span_context.span_id() == span.parent_span_id);
                prop_assert!(parent.is_some());
                let parent = parent.unwrap();
                prop_assert!(parent.start_time <= span.start_time);
                prop_assert!(span.end_time <= parent.end_time);
            }
        }
    }
}

// ── Outcome Properties ──────────────────────────────────────

proptest! {
    /// Draws below the error rate fail validation, all others complete.
    #[test]
    fn outcome_follows_error_rate(p in 0.0f64..1.0) {
        let outcome = ProcessingOutcome::from_draw(p);
        if p < ERROR_PROBABILITY {
            prop_assert_eq!(outcome, ProcessingOutcome::Failed(ErrorType::Validation));
            prop_assert_eq!(outcome.status_label(), "error");
        } else {
            prop_assert_eq!(outcome, ProcessingOutcome::Completed);
            prop_assert_eq!(outcome.status_label(), "completed");
        }
    }
}

// ── Metric Instrument Properties ────────────────────────────

proptest! {
    /// Summary count and sum track every observation.
    #[test]
    fn summary_tracks_count_and_sum(values in prop::collection::vec(0.0f64..10.0, 0..50)) {
        let summary = Summary::new("prop_summary_seconds", "prop").unwrap();
        for v in &values {
            summary.observe(*v);
        }
        prop_assert_eq!(summary.get_sample_count(), values.len() as u64);
        let expected: f64 = values.iter().sum();
        prop_assert!((summary.get_sample_sum() - expected).abs() < 1e-6);
    }

    /// Histogram and summary always agree after `observe_processing`.
    #[test]
    fn histogram_and_summary_agree(values in prop::collection::vec(0.0f64..12.0, 1..50)) {
        let metrics = MetricsRegistry::new().unwrap();
        for v in &values {
            metrics.observe_processing(*v);
        }
        prop_assert_eq!(
            metrics.processing_duration.get_sample_count(),
            metrics.request_latency.get_sample_count()
        );
        prop_assert!(
            (metrics.processing_duration.get_sample_sum()
                - metrics.request_latency.get_sample_sum()).abs() < 1e-9
        );
        let rendered = metrics.render().unwrap();
        let expected_count = format!("app_request_latency_seconds_count {}", values.len());
        prop_assert!(rendered.contains(&expected_count));
    }

    /// The thread-local source honours arbitrary inclusive ranges.
    #[test]
    fn thread_random_stays_in_range(lo in 0u64..1_000_000, width in 0u64..1_000_000) {
        let random = ThreadRandom;
        let hi = lo + width;
        let drawn = random.integer(lo..=hi);
        prop_assert!((lo..=hi).contains(&drawn));
        let secs = random.uniform(PROCESSING_SECS);
        prop_assert!(PROCESSING_SECS.contains(&secs));
    }
}
