//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires from
//! the outside world. Adapters implement these traits. Span export goes
//! through the OpenTelemetry SDK's own `SpanExporter` trait.
//!
//! Port categories:
//! - `RandomSource`: Randomness driving the simulated workload

pub mod random;
