//! Latency statistics and the metrics report
//!
//! Provides percentile calculation, summary statistics over latency samples,
//! and the report emitted at the end of every harness run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use super::error::HarnessError;
use super::resources::ResourceDelta;

/// Latency percentiles (p50, p90, p95, p99, p999)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// 99.9th percentile
    pub p999: f64,
}

impl Percentiles {
    /// Calculate percentiles from sorted latencies (in milliseconds)
    pub fn from_sorted(latencies: &[f64]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }

        Self {
            p50: percentile(latencies, 50.0),
            p90: percentile(latencies, 90.0),
            p95: percentile(latencies, 95.0),
            p99: percentile(latencies, 99.0),
            p999: percentile(latencies, 99.9),
        }
    }
}

/// Calculate percentile value from sorted array
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let fraction = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}

/// Summary statistics over successful latency samples
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Minimum latency in milliseconds
    pub min: f64,
    /// Maximum latency in milliseconds
    pub max: f64,
    /// Mean latency in milliseconds
    pub mean: f64,
    /// Sample standard deviation (n - 1) in milliseconds
    pub std_dev: f64,
    /// Sum of every latency in milliseconds
    pub sum: f64,
    /// Latency percentiles
    pub percentiles: Percentiles,
    /// Number of samples
    pub count: usize,
}

impl LatencyStats {
    /// Calculate statistics from latency samples (in milliseconds).
    ///
    /// Returns `None` for an empty sample set: min/max/mean are undefined there.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let min = sorted[0];
        let max = sorted[count - 1];
        let sum: f64 = sorted.iter().sum();
        let mean = sum / count as f64;

        let std_dev = if count > 1 {
            let variance =
                sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Some(Self {
            min,
            max,
            mean,
            std_dev,
            sum,
            percentiles: Percentiles::from_sorted(&sorted),
            count,
        })
    }

    /// Format as summary string
    pub fn format_summary(&self) -> String {
        format!(
            "min={:.2}ms max={:.2}ms mean={:.2}ms std={:.2}ms p95={:.2}ms p99={:.2}ms",
            self.min, self.max, self.mean, self.std_dev, self.percentiles.p95, self.percentiles.p99
        )
    }
}

/// Structured output of one harness run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Display name of the query
    pub name: String,
    /// Backend the query ran against, if labelled
    pub backend: Option<String>,
    /// When dispatch began
    pub started_at: DateTime<Utc>,
    /// Requested invocation count
    pub total_requests: usize,
    /// Worker pool size
    pub concurrent_users: usize,
    /// Invocations that produced a sample
    pub successful_requests: usize,
    /// Invocations that raised and were excluded
    pub failed_requests: usize,
    /// Wall time of the whole batch
    pub total_execution_time_ms: f64,
    /// Requested invocations per second of batch wall time
    pub throughput_queries_per_sec: f64,
    pub avg_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub response_time_std_dev_ms: f64,
    /// Sum of every successful latency
    pub sum_response_time_ms: f64,
    pub percentiles: Percentiles,
    /// CPU percentage points gained across the batch; `None` when sampling failed
    pub cpu_utilization_increase: Option<f64>,
    /// Memory percentage points gained across the batch; `None` when sampling failed
    pub memory_utilization_increase: Option<f64>,
}

impl MetricsReport {
    /// Assemble a report from the samples collected by one batch
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        name: &str,
        backend: Option<String>,
        started_at: DateTime<Utc>,
        total_requests: usize,
        concurrent_users: usize,
        samples: &[f64],
        total_time: Duration,
        resources: ResourceDelta,
    ) -> Result<Self, HarnessError> {
        let failed_requests = total_requests.saturating_sub(samples.len());
        let latency =
            LatencyStats::from_samples(samples).ok_or_else(|| HarnessError::EmptySampleSet {
                name: name.to_string(),
                failed: failed_requests,
            })?;
        debug!("{} latency: {}", name, latency.format_summary());

        let total_secs = total_time.as_secs_f64();
        let throughput = if total_secs > 0.0 {
            total_requests as f64 / total_secs
        } else {
            0.0
        };

        Ok(Self {
            name: name.to_string(),
            backend,
            started_at,
            total_requests,
            concurrent_users,
            successful_requests: latency.count,
            failed_requests,
            total_execution_time_ms: total_secs * 1000.0,
            throughput_queries_per_sec: throughput,
            avg_response_time_ms: latency.mean,
            min_response_time_ms: latency.min,
            max_response_time_ms: latency.max,
            response_time_std_dev_ms: latency.std_dev,
            sum_response_time_ms: latency.sum,
            percentiles: latency.percentiles,
            cpu_utilization_increase: resources.cpu_percent,
            memory_utilization_increase: resources.memory_percent,
        })
    }

    /// Fraction of invocations that succeeded (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    /// Metric name to value mapping for report consumers.
    ///
    /// Utilization keys are present only when resource sampling succeeded.
    pub fn to_metric_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert(
            "total_execution_time_ms".to_string(),
            self.total_execution_time_ms,
        );
        map.insert(
            "throughput_queries_per_sec".to_string(),
            self.throughput_queries_per_sec,
        );
        map.insert("avg_response_time_ms".to_string(), self.avg_response_time_ms);
        map.insert("min_response_time_ms".to_string(), self.min_response_time_ms);
        map.insert("max_response_time_ms".to_string(), self.max_response_time_ms);
        map.insert(
            "response_time_std_dev_ms".to_string(),
            self.response_time_std_dev_ms,
        );
        if let Some(cpu) = self.cpu_utilization_increase {
            map.insert("cpu_utilization_increase".to_string(), cpu);
        }
        if let Some(memory) = self.memory_utilization_increase {
            map.insert("memory_utilization_increase".to_string(), memory);
        }
        map.insert("total_requests".to_string(), self.total_requests as f64);
        map.insert("concurrent_users".to_string(), self.concurrent_users as f64);
        map.insert(
            "successful_requests".to_string(),
            self.successful_requests as f64,
        );
        map.insert("failed_requests".to_string(), self.failed_requests as f64);
        map
    }

    /// Rows of (description, formatted value, unit) in display order
    pub fn display_rows(&self) -> Vec<(&'static str, String, &'static str)> {
        let optional = |v: Option<f64>| match v {
            Some(v) => format!("{v:.2}"),
            None => "n/a".to_string(),
        };

        vec![
            (
                "Total Execution Time",
                format!("{:.2}", self.total_execution_time_ms),
                "ms",
            ),
            (
                "Throughput",
                format!("{:.2}", self.throughput_queries_per_sec),
                "queries/sec",
            ),
            (
                "Average Response Time",
                format!("{:.2}", self.avg_response_time_ms),
                "ms",
            ),
            (
                "Minimum Response Time",
                format!("{:.2}", self.min_response_time_ms),
                "ms",
            ),
            (
                "Maximum Response Time",
                format!("{:.2}", self.max_response_time_ms),
                "ms",
            ),
            (
                "Response Time Std Deviation",
                format!("{:.2}", self.response_time_std_dev_ms),
                "ms",
            ),
            (
                "CPU Utilization Increase",
                optional(self.cpu_utilization_increase),
                "%",
            ),
            (
                "Memory Utilization Increase",
                optional(self.memory_utilization_increase),
                "%",
            ),
        ]
    }

    /// Write one log line per metric
    pub fn log(&self) {
        let rule = "=".repeat(50);
        info!("{}", rule);
        info!("Performance Metrics for: {}", self.name);
        info!("{}", rule);
        for (description, value, unit) in self.display_rows() {
            info!("{:<30}: {} {}", description, value, unit);
        }
        if self.failed_requests > 0 {
            info!(
                "{:<30}: {} of {}",
                "Failed Requests", self.failed_requests, self.total_requests
            );
        }
        info!("{}", rule);
    }
}
