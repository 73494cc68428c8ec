//! Results storage and comparison
//!
//! Persists measured runs and compares stores on the same queries.

mod compare;
mod storage;

pub use compare::{StoreComparator, StoreComparison};
pub use storage::{ExportFormat, ResultsStorage, RunInfo, StoredRun};

#[cfg(test)]
pub(crate) use storage::fixtures;
