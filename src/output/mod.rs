//! Output formatting module
//!
//! Provides various output formats for measured runs.

mod formatter;

pub use formatter::{ReportFormat, ReportFormatter};
