//! Concurrent query dispatch
//!
//! Fans a query out across a bounded worker pool, joins every invocation,
//! and turns the collected latencies into a [`MetricsReport`].

use chrono::Utc;
use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::error::HarnessError;
use super::metrics::MetricsReport;
use super::resources::{ResourceDelta, ResourceSampler, SystemSampler};
use crate::utils::Timer;

/// Default request count per batch
pub const DEFAULT_REQUESTS: usize = 100;

/// Default number of simulated concurrent users
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Lifecycle of a single harness run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HarnessState {
    Idle,
    Dispatching,
    Awaiting,
    Aggregated,
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HarnessState::Idle => "idle",
            HarnessState::Dispatching => "dispatching",
            HarnessState::Awaiting => "awaiting",
            HarnessState::Aggregated => "aggregated",
        };
        write!(f, "{s}")
    }
}

/// A bound query plus the parameters of the batch it runs in
pub struct QueryJob<F> {
    name: String,
    num_requests: usize,
    concurrency: usize,
    query: F,
}

impl<F> QueryJob<F> {
    pub fn new(name: impl Into<String>, query: F) -> Self {
        Self {
            name: name.into(),
            num_requests: DEFAULT_REQUESTS,
            concurrency: DEFAULT_CONCURRENCY,
            query,
        }
    }

    /// Set number of invocations
    pub fn with_requests(mut self, num_requests: usize) -> Self {
        self.num_requests = num_requests;
        self
    }

    /// Set worker pool size
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Reject parameters that cannot form a batch
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.num_requests < 1 {
            return Err(HarnessError::InvalidParameter {
                parameter: "num_requests",
                value: self.num_requests,
            });
        }
        if self.concurrency < 1 {
            return Err(HarnessError::InvalidParameter {
                parameter: "concurrency",
                value: self.concurrency,
            });
        }
        Ok(())
    }
}

/// Performance measurement harness
pub struct PerformanceHarness {
    sampler: Box<dyn ResourceSampler>,
    state: HarnessState,
    backend: Option<String>,
}

impl PerformanceHarness {
    /// Create a harness that samples the host with `sysinfo`
    pub fn new() -> Self {
        Self::with_sampler(SystemSampler::new())
    }

    /// Create a harness with a custom resource sampler
    pub fn with_sampler(sampler: impl ResourceSampler + 'static) -> Self {
        Self {
            sampler: Box::new(sampler),
            state: HarnessState::Idle,
            backend: None,
        }
    }

    /// Label every report with the store the queries are bound to
    pub fn for_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    fn transition(&mut self, next: HarnessState) {
        debug!("Harness state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run `query` `num_requests` times across `concurrency` workers
    pub async fn measure<F, Fut, T>(
        &mut self,
        query: F,
        name: &str,
        num_requests: usize,
        concurrency: usize,
    ) -> Result<MetricsReport, HarnessError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let job = QueryJob::new(name, query)
            .with_requests(num_requests)
            .with_concurrency(concurrency);
        self.run(job).await
    }

    /// Run one batch to completion.
    ///
    /// Failed invocations are logged and excluded from the latency samples.
    /// Fails with [`HarnessError::EmptySampleSet`] when nothing succeeded.
    pub async fn run<F, Fut, T>(&mut self, job: QueryJob<F>) -> Result<MetricsReport, HarnessError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.state = HarnessState::Idle;
        job.validate()?;

        let QueryJob {
            name,
            num_requests,
            concurrency,
            query,
        } = job;

        info!("Performance Test Started: {}", name);
        if let Some(backend) = &self.backend {
            info!("Backend: {}", backend);
        }
        info!("Concurrent Users: {}", concurrency);
        info!("Total Requests: {}", num_requests);

        let before = self.sampler.sample();

        self.transition(HarnessState::Dispatching);
        let started_at = Utc::now();
        let batch = Timer::start(format!("batch '{name}'"));

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let query = Arc::new(query);

        let handles: Vec<_> = (0..num_requests)
            .map(|_| {
                let semaphore = semaphore.clone();
                let query = query.clone();

                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| e.to_string())?;

                    let timer = Timer::start("query");
                    match (*query)().await {
                        Ok(_) => Ok(timer.elapsed_ms()),
                        Err(e) => Err(format!("{e:#}")),
                    }
                })
            })
            .collect();

        self.transition(HarnessState::Awaiting);
        let outcomes = join_all(handles).await;
        let total_time = batch.stop();

        let after = self.sampler.sample();

        let mut samples = Vec::with_capacity(num_requests);
        let mut failed = 0usize;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let outcome = outcome.unwrap_or_else(|e| Err(format!("task aborted: {e}")));
            match outcome {
                Ok(latency_ms) => samples.push(latency_ms),
                Err(message) => {
                    failed += 1;
                    let err = HarnessError::QueryExecution {
                        name: name.clone(),
                        index,
                        message,
                    };
                    error!("{}", err);
                }
            }
        }

        if failed > 0 {
            warn!("{} of {} invocations of '{}' failed", failed, num_requests, name);
        }

        let resources = ResourceDelta::between(&before, &after);
        let report = MetricsReport::build(
            &name,
            self.backend.clone(),
            started_at,
            num_requests,
            concurrency,
            &samples,
            total_time,
            resources,
        );
        self.transition(HarnessState::Aggregated);

        let report = report?;
        report.log();
        Ok(report)
    }
}

impl Default for PerformanceHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::resources::{FixedSampler, ResourceSnapshot};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn harness() -> PerformanceHarness {
        PerformanceHarness::with_sampler(FixedSampler::new(10.0, 50.0))
    }

    async fn sleepy(ms: u64) -> anyhow::Result<()> {
        sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    struct BrokenSampler;

    impl ResourceSampler for BrokenSampler {
        fn sample(&mut self) -> Result<ResourceSnapshot, HarnessError> {
            Err(HarnessError::ResourceSampling("sampler offline".to_string()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_succeed() {
        let mut harness = harness();
        let report = harness
            .measure(|| sleepy(5), "constant", 20, 5)
            .await
            .unwrap();

        assert_eq!(report.successful_requests, 20);
        assert_eq!(report.failed_requests, 0);
        assert_eq!(report.total_requests, 20);
        assert_eq!(report.concurrent_users, 5);
        assert!(report.min_response_time_ms >= 5.0);
        // four waves of five
        assert!(report.total_execution_time_ms >= 20.0);

        let expected = 20.0 / (report.total_execution_time_ms / 1000.0);
        assert!((report.throughput_queries_per_sec - expected).abs() < 1e-6);
        assert_eq!(report.cpu_utilization_increase, Some(0.0));
        assert_eq!(harness.state(), HarnessState::Aggregated);
    }

    #[tokio::test]
    async fn test_all_fail_is_empty_sample_set() {
        let mut harness = harness();
        let err = harness
            .measure(
                || async { Err::<(), _>(anyhow::anyhow!("connection refused")) },
                "broken",
                8,
                4,
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            HarnessError::EmptySampleSet {
                name: "broken".to_string(),
                failed: 8
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_partial_failures_excluded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let query = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call % 3 == 2 {
                    anyhow::bail!("every third call fails");
                }
                sleep(Duration::from_millis(5)).await;
                Ok(call)
            }
        };

        let mut harness = harness();
        let report = harness.measure(query, "flaky", 9, 3).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 9);
        assert_eq!(report.successful_requests, 6);
        assert_eq!(report.failed_requests, 3);
        // instant failures never pull the minimum below the sleep
        assert!(report.min_response_time_ms >= 5.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeated_runs_are_consistent() {
        let mut harness = harness();
        let first = harness
            .measure(|| sleepy(10), "repeat", 20, 10)
            .await
            .unwrap();
        let second = harness
            .measure(|| sleepy(10), "repeat", 20, 10)
            .await
            .unwrap();

        let ratio = first.throughput_queries_per_sec / second.throughput_queries_per_sec;
        assert!(ratio > 0.33 && ratio < 3.0, "ratio was {ratio}");
    }

    #[tokio::test]
    async fn test_single_request_has_zero_std_dev() {
        let mut harness = harness();
        let report = harness.measure(|| sleepy(1), "single", 1, 1).await.unwrap();

        assert_eq!(report.successful_requests, 1);
        assert_eq!(report.response_time_std_dev_ms, 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_serial_total_matches_sum() {
        let mut harness = harness();
        let report = harness.measure(|| sleepy(5), "serial", 5, 1).await.unwrap();

        let sum = report.sum_response_time_ms;
        assert!(report.total_execution_time_ms >= sum);
        assert!(report.total_execution_time_ms - sum < 50.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_parallelism() {
        let mut harness = harness();
        let report = harness.measure(|| sleepy(10), "t", 10, 10).await.unwrap();

        assert_eq!(report.successful_requests, 10);
        assert!(report.avg_response_time_ms >= 10.0);
        assert!(report.avg_response_time_ms < 100.0);
        assert!(report.throughput_queries_per_sec <= 1000.0);
        // concurrent batch is shorter than the sum of its parts
        assert!(report.total_execution_time_ms < report.sum_response_time_ms);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (current, max) = (in_flight.clone(), peak.clone());
        let query = move || {
            let (current, max) = (current.clone(), max.clone());
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        };

        let mut harness = harness();
        harness.measure(query, "bounded", 30, 3).await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_invalid_parameters_rejected() {
        let mut harness = harness();

        let err = harness.measure(|| sleepy(1), "zero", 0, 1).await.unwrap_err();
        assert_eq!(
            err,
            HarnessError::InvalidParameter {
                parameter: "num_requests",
                value: 0
            }
        );

        let err = harness.measure(|| sleepy(1), "zero", 1, 0).await.unwrap_err();
        assert_eq!(
            err,
            HarnessError::InvalidParameter {
                parameter: "concurrency",
                value: 0
            }
        );
        assert_eq!(harness.state(), HarnessState::Idle);
    }

    #[tokio::test]
    async fn test_sampling_failure_degrades() {
        let mut harness = PerformanceHarness::with_sampler(BrokenSampler);
        let report = harness.measure(|| sleepy(1), "ping", 3, 3).await.unwrap();

        assert_eq!(report.successful_requests, 3);
        assert_eq!(report.cpu_utilization_increase, None);
        assert_eq!(report.memory_utilization_increase, None);
    }

    #[tokio::test]
    async fn test_backend_label() {
        let mut harness = harness().for_backend("kv");
        let job = QueryJob::new("labelled", || sleepy(1))
            .with_requests(2)
            .with_concurrency(2);

        let report = harness.run(job).await.unwrap();
        assert_eq!(report.backend.as_deref(), Some("kv"));
        assert_eq!(harness.state(), HarnessState::Aggregated);
    }
}
