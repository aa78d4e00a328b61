//! HDR latency percentiles over successful outcomes (`hdr` feature).

use crate::outcome::BenchmarkRun;
use hdrhistogram::Histogram;
use std::time::Duration;

/// Tracks one microsecond up to one hour at 3 significant figures.
const MAX_LATENCY_MICROS: u64 = 3_600_000_000;

/// Latency distribution of a run's successful outcomes.
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_LATENCY_MICROS, 3)
            .expect("static histogram bounds are valid");
        Self { histogram }
    }

    /// Build a histogram from a sealed run.
    pub fn from_run(run: &BenchmarkRun) -> Self {
        let mut this = Self::new();
        for outcome in run.outcomes.iter().filter(|o| o.is_success()) {
            this.record(outcome.elapsed);
        }
        this
    }

    pub fn record(&mut self, latency: Duration) {
        self.histogram
            .saturating_record(latency.as_micros().max(1) as u64);
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Latency at the given quantile in `[0, 1]`.
    pub fn at_quantile(&self, q: f64) -> Duration {
        Duration::from_micros(self.histogram.value_at_quantile(q))
    }

    pub fn p50(&self) -> Duration {
        self.at_quantile(0.50)
    }

    pub fn p90(&self) -> Duration {
        self.at_quantile(0.90)
    }

    pub fn p99(&self) -> Duration {
        self.at_quantile(0.99)
    }

    pub fn max(&self) -> Duration {
        Duration::from_micros(self.histogram.max())
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}
