//! Harness error taxonomy

use thiserror::Error;

/// Errors raised by the measurement harness
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    /// A single query invocation failed. Recoverable: the sample is dropped.
    #[error("Query '{name}' failed on invocation {index}: {message}")]
    QueryExecution {
        name: String,
        index: usize,
        message: String,
    },

    /// Every invocation in the batch failed, so no statistics exist.
    #[error("Query '{name}' produced no samples: all {failed} invocations failed")]
    EmptySampleSet { name: String, failed: usize },

    /// CPU or memory sampling failed. Utilization deltas become unavailable.
    #[error("Resource sampling failed: {0}")]
    ResourceSampling(String),

    /// Rejected before dispatch
    #[error("Invalid {parameter}: {value} (must be at least 1)")]
    InvalidParameter {
        parameter: &'static str,
        value: usize,
    },
}
