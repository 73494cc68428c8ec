//! Performance measurement harness
//!
//! Runs a bound query many times across a bounded pool of concurrent callers,
//! samples host utilization around the batch, and reports latency and
//! throughput statistics.

mod error;
mod metrics;
mod resources;
mod runner;

pub use metrics::MetricsReport;
pub use runner::{PerformanceHarness, DEFAULT_CONCURRENCY, DEFAULT_REQUESTS};

#[cfg(test)]
pub use resources::{FixedSampler, ResourceDelta};
