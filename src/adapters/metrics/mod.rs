//! Metrics Adapters
//!
//! Prometheus registry holding every instrument of the application and
//! the summary collector the `prometheus` crate does not provide.
//! Rendering is served by `adapters::http` on `/metrics`.

pub mod registry;
pub mod summary;

pub use registry::MetricsRegistry;
pub use summary::Summary;
