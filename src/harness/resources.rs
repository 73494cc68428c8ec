//! System resource sampling
//!
//! CPU and memory utilization are sampled once before dispatch and once after
//! the join barrier. The harness only ever reads the sampler at those points.

use serde::{Deserialize, Serialize};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

use super::error::HarnessError;

/// Point-in-time utilization, in percent of the whole machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Utilization after the batch minus utilization before it
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDelta {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

impl ResourceDelta {
    /// Delta with both values unavailable
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Compute the delta between two samples, degrading on any failure
    pub fn between(
        before: &Result<ResourceSnapshot, HarnessError>,
        after: &Result<ResourceSnapshot, HarnessError>,
    ) -> Self {
        match (before, after) {
            (Ok(before), Ok(after)) => Self {
                cpu_percent: Some(after.cpu_percent - before.cpu_percent),
                memory_percent: Some(after.memory_percent - before.memory_percent),
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!("Utilization delta unavailable: {}", e);
                Self::unavailable()
            }
        }
    }
}

/// Probe for process-wide CPU and memory utilization
pub trait ResourceSampler: Send {
    fn sample(&mut self) -> Result<ResourceSnapshot, HarnessError>;
}

/// Sampler backed by `sysinfo`.
///
/// CPU usage is measured since the previous refresh, so the baseline sample
/// covers the interval since construction.
pub struct SystemSampler {
    system: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        Self { system }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SystemSampler {
    fn sample(&mut self) -> Result<ResourceSnapshot, HarnessError> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        if self.system.cpus().is_empty() {
            return Err(HarnessError::ResourceSampling(
                "no CPU information available".to_string(),
            ));
        }

        let total = self.system.total_memory();
        if total == 0 {
            return Err(HarnessError::ResourceSampling(
                "total memory reported as zero".to_string(),
            ));
        }

        Ok(ResourceSnapshot {
            cpu_percent: self.system.global_cpu_usage() as f64,
            memory_percent: self.system.used_memory() as f64 / total as f64 * 100.0,
        })
    }
}

/// Sampler that always reports fixed values
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct FixedSampler {
    snapshot: ResourceSnapshot,
}

#[cfg(test)]
impl FixedSampler {
    pub fn new(cpu_percent: f64, memory_percent: f64) -> Self {
        Self {
            snapshot: ResourceSnapshot {
                cpu_percent,
                memory_percent,
            },
        }
    }
}

#[cfg(test)]
impl ResourceSampler for FixedSampler {
    fn sample(&mut self) -> Result<ResourceSnapshot, HarnessError> {
        Ok(self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_between() {
        let before = Ok(ResourceSnapshot {
            cpu_percent: 10.0,
            memory_percent: 40.0,
        });
        let after = Ok(ResourceSnapshot {
            cpu_percent: 35.5,
            memory_percent: 40.5,
        });

        let delta = ResourceDelta::between(&before, &after);
        assert_eq!(delta.cpu_percent, Some(25.5));
        assert_eq!(delta.memory_percent, Some(0.5));
    }

    #[test]
    fn test_delta_degrades_on_failure() {
        let before = Ok(ResourceSnapshot::default());
        let after = Err(HarnessError::ResourceSampling("offline".into()));

        let delta = ResourceDelta::between(&before, &after);
        assert_eq!(delta, ResourceDelta::unavailable());
        assert_eq!(delta.cpu_percent, None);
    }

    #[test]
    fn test_fixed_sampler() {
        let mut sampler = FixedSampler::new(5.0, 50.0);
        let snapshot = sampler.sample().unwrap();
        assert_eq!(snapshot.cpu_percent, 5.0);
        assert_eq!(snapshot.memory_percent, 50.0);
    }

    #[test]
    fn test_system_sampler_memory_in_range() {
        let mut sampler = SystemSampler::new();
        if let Ok(snapshot) = sampler.sample() {
            assert!(snapshot.memory_percent >= 0.0);
            assert!(snapshot.memory_percent <= 100.0);
        }
    }
}
