//! In-process operation timings surfaced through the debug endpoint.

use std::{
    collections::VecDeque,
    future::Future,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

const SAMPLES_PER_OPERATION: usize = 100;
const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(1_000);

/// Rolling duration samples per named operation.
pub struct OperationMetrics {
    samples: DashMap<&'static str, VecDeque<Duration>>,
    slow_threshold: Duration,
}

/// Aggregated view over the retained samples of one operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationSummary {
    /// Number of retained samples.
    pub samples: usize,
    /// Mean duration in milliseconds.
    pub average_ms: f64,
    /// Fastest retained sample.
    pub min_ms: u64,
    /// Slowest retained sample.
    pub max_ms: u64,
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_THRESHOLD)
    }
}

impl OperationMetrics {
    /// Metrics warning on operations slower than `slow_threshold`.
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            samples: DashMap::new(),
            slow_threshold,
        }
    }

    /// Await `future` and record how long it took under `operation`.
    pub async fn observe<F, T>(&self, operation: &'static str, future: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = future.await;
        self.record(operation, started.elapsed());
        output
    }

    /// Store one sample, evicting the oldest past the retention limit.
    pub fn record(&self, operation: &'static str, elapsed: Duration) {
        if elapsed > self.slow_threshold {
            warn!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow operation"
            );
        }

        let mut samples = self.samples.entry(operation).or_default();
        samples.push_back(elapsed);
        while samples.len() > SAMPLES_PER_OPERATION {
            samples.pop_front();
        }
    }

    /// Summaries keyed by operation name, sorted alphabetically.
    pub fn summary(&self) -> IndexMap<String, OperationSummary> {
        let mut rows: Vec<(String, OperationSummary)> = self
            .samples
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| (entry.key().to_string(), summarize(entry.value())))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows.into_iter().collect()
    }
}

fn summarize(samples: &VecDeque<Duration>) -> OperationSummary {
    let millis: Vec<u64> = samples.iter().map(|d| d.as_millis() as u64).collect();
    let total: u64 = millis.iter().sum();
    OperationSummary {
        samples: millis.len(),
        average_ms: total as f64 / millis.len() as f64,
        min_ms: millis.iter().copied().min().unwrap_or_default(),
        max_ms: millis.iter().copied().max().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_most_recent_samples() {
        let metrics = OperationMetrics::default();
        for ms in 0..150 {
            metrics.record("round.tick", Duration::from_millis(ms));
        }

        let summary = metrics.summary();
        let tick = &summary["round.tick"];
        assert_eq!(tick.samples, SAMPLES_PER_OPERATION);
        assert_eq!(tick.min_ms, 50);
        assert_eq!(tick.max_ms, 149);
    }

    #[test]
    fn summary_is_sorted_by_operation() {
        let metrics = OperationMetrics::default();
        metrics.record("votes.cast", Duration::from_millis(4));
        metrics.record("posts.submit", Duration::from_millis(2));
        metrics.record("posts.submit", Duration::from_millis(6));

        let summary = metrics.summary();
        let names: Vec<_> = summary.keys().cloned().collect();
        assert_eq!(names, ["posts.submit", "votes.cast"]);
        assert_eq!(summary["posts.submit"].average_ms, 4.0);
    }

    #[tokio::test]
    async fn observe_records_and_returns_output() {
        let metrics = OperationMetrics::default();
        let value = metrics.observe("noop", async { 7 }).await;

        assert_eq!(value, 7);
        assert_eq!(metrics.summary()["noop"].samples, 1);
    }
}
