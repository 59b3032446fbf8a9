//! Domain layer - Workload parameters.
//!
//! Pure types with no I/O: the constants and outcomes of the simulated
//! workload. All types are testable in isolation.

pub mod workload;

// Re-export core types for convenience
pub use workload::{ErrorType, ProcessingOutcome};
