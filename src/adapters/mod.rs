//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` and the span
//! export seam of the OpenTelemetry SDK with concrete external
//! dependencies (HTTP server, OTLP collector, Prometheus, RNG).
//!
//! Adapter categories:
//! - `discard`: span exporter dropping every batch (export disabled)
//! - `http`: axum server for `/metrics`, `/health` and `/`
//! - `metrics`: Prometheus registry and the summary collector
//! - `otlp`: OTLP/HTTP span exporter
//! - `random`: thread-local RNG behind `RandomSource`

pub mod discard;
pub mod http;
pub mod metrics;
pub mod otlp;
pub mod random;
