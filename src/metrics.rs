//! Pure aggregation of a sealed run into comparable metrics.

use crate::monitor::MonitorStats;
use crate::outcome::{BenchmarkRun, OutcomeStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Aggregate metrics of one [`BenchmarkRun`].
///
/// Every division is guarded: a zero denominator yields 0, never an
/// error, so empty and instantaneous runs aggregate cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_items: usize,
    pub successes: usize,
    pub failures: usize,
    /// Failure counts keyed by stable reason label.
    pub failure_reasons: BTreeMap<String, usize>,
    /// `successes / total_items`, in `[0, 1]`.
    pub success_rate: f64,
    /// Successful items per wall-clock second.
    pub throughput: f64,
    /// Mean latency over successful outcomes only.
    #[serde(with = "crate::outcome::duration_serde")]
    pub mean_latency: Duration,
    pub total_bytes: u64,
    #[serde(with = "crate::outcome::duration_serde")]
    pub wall_time: Duration,
    pub peak_in_flight: usize,
    pub cpu_cores: usize,
    pub cpu_avg_percent: f64,
    pub cpu_peak_percent: f64,
    pub memory_avg_bytes: f64,
    pub memory_peak_bytes: u64,
    pub network_sent_bytes: u64,
    pub network_received_bytes: u64,
    /// Successful items per CPU-core-second of wall time.
    pub successes_per_core_second: f64,
    /// Successful items per GB of average memory in use.
    pub successes_per_gb_memory: f64,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Aggregate a sealed run. Pure: calling it twice on the same run
/// yields identical metrics.
pub fn aggregate(run: &BenchmarkRun) -> RunMetrics {
    let successes = run.outcomes.iter().filter(|o| o.is_success()).count();
    let failures = run.outcomes.len() - successes;

    let mut failure_reasons = BTreeMap::new();
    for outcome in &run.outcomes {
        if let OutcomeStatus::Failure { reason } = &outcome.status {
            *failure_reasons.entry(reason.label().to_string()).or_insert(0) += 1;
        }
    }

    let success_latency_sum: Duration = run
        .outcomes
        .iter()
        .filter(|o| o.is_success())
        .map(|o| o.elapsed)
        .sum();
    let mean_latency = if successes > 0 {
        success_latency_sum / successes as u32
    } else {
        Duration::ZERO
    };

    let total_bytes: u64 = run.outcomes.iter().map(|o| o.bytes()).sum();

    let wall_secs = run.wall_time.as_secs_f64();
    let throughput = ratio(successes as f64, wall_secs);

    let resources = MonitorStats::from_samples(&run.samples);
    let (cpu_avg, cpu_peak, mem_avg, mem_peak, net_sent, net_received) = match &resources {
        Some(stats) => (
            stats.cpu_avg_percent,
            stats.cpu_max_percent,
            stats.memory_avg_bytes,
            stats.memory_max_bytes,
            stats.network_sent_bytes,
            stats.network_received_bytes,
        ),
        None => (0.0, 0.0, 0.0, 0, 0, 0),
    };

    RunMetrics {
        total_items: run.total_items,
        successes,
        failures,
        failure_reasons,
        success_rate: ratio(successes as f64, run.total_items as f64),
        throughput,
        mean_latency,
        total_bytes,
        wall_time: run.wall_time,
        peak_in_flight: run.peak_in_flight,
        cpu_cores: run.cpu_cores,
        cpu_avg_percent: cpu_avg,
        cpu_peak_percent: cpu_peak,
        memory_avg_bytes: mem_avg,
        memory_peak_bytes: mem_peak,
        network_sent_bytes: net_sent,
        network_received_bytes: net_received,
        successes_per_core_second: ratio(throughput, run.cpu_cores as f64),
        successes_per_gb_memory: ratio(successes as f64, mem_avg / BYTES_PER_GB),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::outcome::{FailureReason, Outcome, RunStatus, SampleRecord};
    use crate::workload::WorkItem;

    fn item(n: usize) -> WorkItem {
        WorkItem::new(format!("https://example.com/{}", n))
    }

    fn sealed_run(outcomes: Vec<Outcome>, wall_time: Duration) -> BenchmarkRun {
        BenchmarkRun {
            config: RunConfig::default(),
            status: RunStatus::Complete,
            total_items: outcomes.len(),
            cpu_cores: 4,
            started_at: "0".to_string(),
            wall_time,
            peak_in_flight: 1,
            outcomes,
            samples: Vec::new(),
        }
    }

    #[test]
    fn should_conserve_item_counts() {
        let run = sealed_run(
            vec![
                Outcome::success(item(1), 0, Duration::from_millis(10), 100),
                Outcome::success(item(2), 0, Duration::from_millis(30), 300),
                Outcome::failure(item(3), 1, Duration::from_millis(5), FailureReason::Timeout),
                Outcome::failure(
                    item(4),
                    1,
                    Duration::from_millis(6),
                    FailureReason::RateLimited,
                ),
                Outcome::failure(item(5), 1, Duration::from_millis(7), FailureReason::Timeout),
            ],
            Duration::from_secs(2),
        );

        let metrics = aggregate(&run);
        assert_eq!(metrics.successes + metrics.failures, metrics.total_items);
        assert_eq!(metrics.successes, 2);
        assert_eq!(metrics.failure_reasons["timeout"], 2);
        assert_eq!(metrics.failure_reasons["rate_limited"], 1);
        assert!((metrics.success_rate - 0.4).abs() < 1e-9);
        assert!((metrics.throughput - 1.0).abs() < 1e-9);
        assert_eq!(metrics.mean_latency, Duration::from_millis(20));
        assert_eq!(metrics.total_bytes, 400);
    }

    #[test]
    fn should_be_idempotent() {
        let run = sealed_run(
            vec![
                Outcome::success(item(1), 0, Duration::from_millis(10), 100),
                Outcome::failure(item(2), 0, Duration::from_millis(5), FailureReason::Timeout),
            ],
            Duration::from_millis(1500),
        );
        assert_eq!(aggregate(&run), aggregate(&run));
    }

    #[test]
    fn should_handle_zero_items_without_error() {
        let metrics = aggregate(&sealed_run(Vec::new(), Duration::from_secs(1)));
        assert_eq!(metrics.total_items, 0);
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.throughput, 0.0);
        assert_eq!(metrics.mean_latency, Duration::ZERO);
    }

    #[test]
    fn should_handle_zero_duration_without_error() {
        let run = sealed_run(
            vec![Outcome::success(item(1), 0, Duration::ZERO, 10)],
            Duration::ZERO,
        );
        let metrics = aggregate(&run);
        assert_eq!(metrics.throughput, 0.0);
        assert_eq!(metrics.successes_per_core_second, 0.0);
    }

    #[test]
    fn should_zero_efficiency_metrics_without_samples() {
        let run = sealed_run(
            vec![Outcome::success(item(1), 0, Duration::from_millis(1), 10)],
            Duration::from_secs(1),
        );
        let metrics = aggregate(&run);
        assert_eq!(metrics.cpu_avg_percent, 0.0);
        assert_eq!(metrics.successes_per_gb_memory, 0.0);
    }

    #[test]
    fn should_derive_efficiency_from_samples() {
        let mut run = sealed_run(
            vec![
                Outcome::success(item(1), 0, Duration::from_millis(10), 1),
                Outcome::success(item(2), 0, Duration::from_millis(10), 1),
            ],
            Duration::from_secs(1),
        );
        run.samples = vec![
            SampleRecord {
                elapsed: Duration::from_millis(0),
                cpu_percent: 50.0,
                memory_used_bytes: 2 * 1024 * 1024 * 1024,
                network: None,
            },
            SampleRecord {
                elapsed: Duration::from_millis(500),
                cpu_percent: 70.0,
                memory_used_bytes: 2 * 1024 * 1024 * 1024,
                network: None,
            },
        ];

        let metrics = aggregate(&run);
        assert!((metrics.cpu_avg_percent - 60.0).abs() < 1e-6);
        assert_eq!(metrics.memory_peak_bytes, 2 * 1024 * 1024 * 1024);
        // 2 successes / 1s / 4 cores
        assert!((metrics.successes_per_core_second - 0.5).abs() < 1e-9);
        // 2 successes / 2 GB average
        assert!((metrics.successes_per_gb_memory - 1.0).abs() < 1e-6);
    }
}
