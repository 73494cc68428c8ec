//! Monotonic timing helpers
//!
//! `Timer` measures one span, such as a query or a batch. `PhaseTimer`
//! splits a command into named phases (generate, write, load).

use std::time::{Duration, Instant};
use tracing::debug;

/// Times a single labelled span
#[derive(Debug)]
pub struct Timer {
    label: String,
    started: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
        }
    }

    /// Fractional milliseconds since start
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Finish the span, logging it at debug level
    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        debug!("{} took {:.3}ms", self.label, elapsed.as_secs_f64() * 1000.0);
        elapsed
    }
}

/// Consecutive named phases of one command
#[derive(Debug)]
pub struct PhaseTimer {
    started: Instant,
    phase_started: Instant,
    phases: Vec<(&'static str, Duration)>,
}

impl PhaseTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            phase_started: now,
            phases: Vec::new(),
        }
    }

    /// Close the current phase under `name` and begin the next one
    pub fn finish(&mut self, name: &'static str) -> Duration {
        let now = Instant::now();
        let took = now - self.phase_started;
        self.phase_started = now;
        self.phases.push((name, took));
        took
    }

    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timer() {
        let timer = Timer::start("query");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
        assert!(timer.stop() >= Duration::from_millis(10));
    }

    #[test]
    fn test_phases_are_not_cumulative() {
        let mut clock = PhaseTimer::start();
        sleep(Duration::from_millis(20));
        clock.finish("generate");
        sleep(Duration::from_millis(10));
        let write = clock.finish("write");

        let names: Vec<_> = clock.phases().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["generate", "write"]);
        assert!(write >= Duration::from_millis(10));
        assert!(write < clock.total());
        assert!(clock.phases()[0].1 >= Duration::from_millis(20));
    }
}
