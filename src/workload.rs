//! Work items and the injected unit of work.
//!
//! The engine never performs network I/O itself. It consumes a
//! [`UnitOfWork`] capability: one async operation per item that may be
//! slow and may fail. Production callers wire in a real fetch;
//! [`SimulatedFetch`] stands in for it with configurable latency and
//! failure injection, which also gives tests reproducible inputs.

use crate::outcome::FailureReason;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// One unit of input, processed exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Successful fetch payload, reduced to what the aggregator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: u64,
}

pub type FetchResult = std::result::Result<Fetched, FailureReason>;

pub type FetchFuture = Pin<Box<dyn Future<Output = FetchResult> + Send>>;

/// The externally supplied per-item operation.
///
/// Implementations must be safe to call from multiple workers at once.
/// `FailureReason::Timeout` and `FailureReason::WorkerAborted` are
/// reserved for the engine; a unit of work reports its own failures
/// with the remaining variants.
pub trait UnitOfWork: Send + Sync {
    fn fetch(&self, item: &WorkItem) -> FetchFuture;
}

impl<F> UnitOfWork for F
where
    F: Fn(&WorkItem) -> FetchFuture + Send + Sync,
{
    fn fetch(&self, item: &WorkItem) -> FetchFuture {
        self(item)
    }
}

/// Generate a synthetic item set for benchmarking.
pub fn generate_items(count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|i| WorkItem::new(format!("https://shop.example/catalogue/page-{}.html", i + 1)))
        .collect()
}

/// A stand-in for a real fetch: waits a random latency, then succeeds
/// with a random payload size or fails with the configured probability.
#[derive(Debug, Clone)]
pub struct SimulatedFetch {
    latency_min: Duration,
    latency_max: Duration,
    failure_probability: f64,
    payload_min: u64,
    payload_max: u64,
}

impl Default for SimulatedFetch {
    fn default() -> Self {
        Self {
            latency_min: Duration::from_millis(10),
            latency_max: Duration::from_millis(30),
            failure_probability: 0.10,
            payload_min: 15_000,
            payload_max: 45_000,
        }
    }
}

impl SimulatedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-item latency range.
    pub fn latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency_min = min;
        self.latency_max = max.max(min);
        self
    }

    /// Set the probability in `[0, 1]` that an item fails.
    pub fn failure_probability(mut self, p: f64) -> Self {
        self.failure_probability = p.clamp(0.0, 1.0);
        self
    }

    /// Set the payload size range for successful items.
    pub fn payload_bytes(mut self, min: u64, max: u64) -> Self {
        self.payload_min = min;
        self.payload_max = max.max(min);
        self
    }
}

impl UnitOfWork for SimulatedFetch {
    fn fetch(&self, _item: &WorkItem) -> FetchFuture {
        // Sample up front so the thread-local rng is not held across an await.
        let (delay, failed, bytes) = {
            let mut rng = rand::rng();
            let delay_micros = rng.random_range(
                self.latency_min.as_micros() as u64..=self.latency_max.as_micros() as u64,
            );
            (
                Duration::from_micros(delay_micros),
                rng.random::<f64>() < self.failure_probability,
                rng.random_range(self.payload_min..=self.payload_max),
            )
        };

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if failed {
                Err(FailureReason::RateLimited)
            } else {
                Ok(Fetched { bytes })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_distinct_items() {
        let items = generate_items(100);
        assert_eq!(items.len(), 100);
        let unique: std::collections::HashSet<_> = items.iter().collect();
        assert_eq!(unique.len(), 100);
    }

    #[tokio::test]
    async fn should_always_succeed_with_zero_failure_probability() {
        let work = SimulatedFetch::new()
            .latency(Duration::ZERO, Duration::from_micros(10))
            .failure_probability(0.0)
            .payload_bytes(100, 200);

        for item in generate_items(20) {
            let fetched = work.fetch(&item).await.expect("must succeed");
            assert!((100..=200).contains(&fetched.bytes));
        }
    }

    #[tokio::test]
    async fn should_always_fail_with_certain_failure_probability() {
        let work = SimulatedFetch::new()
            .latency(Duration::ZERO, Duration::from_micros(10))
            .failure_probability(1.0);

        let item = WorkItem::new("https://shop.example/catalogue/page-1.html");
        assert_eq!(
            work.fetch(&item).await.unwrap_err(),
            FailureReason::RateLimited
        );
    }

    #[tokio::test]
    async fn should_accept_closures_as_unit_of_work() {
        let work = |item: &WorkItem| -> FetchFuture {
            let bytes = item.as_str().len() as u64;
            Box::pin(async move { Ok(Fetched { bytes }) })
        };

        let item = WorkItem::new("abcd");
        assert_eq!(work.fetch(&item).await.unwrap().bytes, 4);
    }
}
