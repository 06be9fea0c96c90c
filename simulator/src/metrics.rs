//! Scenario run summary.

use serde::Serialize;

/// Outcome counts and latencies across scenario runs.
#[derive(Debug, Clone, Default)]
pub struct SimulationMetrics {
    /// Scenarios run.
    pub total_runs: u64,
    /// Runs that behaved as expected.
    pub passed_runs: u64,
    /// Runs that did not.
    pub failed_runs: u64,
    latency_samples: Vec<u64>,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one run.
    pub fn record(&mut self, passed: bool, latency_ms: u64) {
        self.total_runs += 1;
        if passed {
            self.passed_runs += 1;
        } else {
            self.failed_runs += 1;
        }
        self.latency_samples.push(latency_ms);
    }

    pub fn average_latency_ms(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    pub fn p50_latency_ms(&self) -> u64 {
        self.percentile_latency(50)
    }

    pub fn p99_latency_ms(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted = self.latency_samples.clone();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Serializable summary.
    pub fn summary(&self) -> Summary {
        Summary {
            total_runs: self.total_runs,
            passed_runs: self.passed_runs,
            failed_runs: self.failed_runs,
            average_latency_ms: self.average_latency_ms(),
            p50_latency_ms: self.p50_latency_ms(),
            p99_latency_ms: self.p99_latency_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_runs: u64,
    pub passed_runs: u64,
    pub failed_runs: u64,
    pub average_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p99_latency_ms: u64,
}
