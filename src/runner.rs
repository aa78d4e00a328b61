//! The run lifecycle and the per-item processing shared by both strategies.

use crate::bounded;
use crate::config::{RunConfig, StrategyKind};
use crate::error::Result;
use crate::monitor::ResourceMonitor;
use crate::outcome::{BenchmarkRun, FailureReason, Outcome, RunStatus};
use crate::threaded;
use crate::workload::{UnitOfWork, WorkItem};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Cooperative run-level cancellation signal.
///
/// Cancelling stops the dispatch of new items; in-flight items run to
/// completion or to their individual timeout, and the run is sealed as
/// [`RunStatus::Incomplete`] with everything collected so far.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Tracks how many items are being processed right now, and the highest
/// that number ever got. Both strategies report through this gauge, so
/// the concurrency bound is observable rather than assumed.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the gauge for the lifetime of the returned guard.
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct GaugeGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Process one item to a terminal [`Outcome`].
///
/// Applies the per-attempt timeout and the retry policy; elapsed time
/// covers all attempts. Exactly one outcome is produced per call no
/// matter how the unit of work behaves, short of a panic (which the
/// calling strategy contains).
pub(crate) async fn process_item(
    work: &dyn UnitOfWork,
    item: &WorkItem,
    worker: usize,
    config: &RunConfig,
    token: &CancelToken,
    gauge: &InFlightGauge,
) -> Outcome {
    let _guard = gauge.enter();
    let start = Instant::now();
    let mut last_reason = FailureReason::WorkerAborted;

    for attempt in 1..=config.retry.max_attempts {
        match tokio::time::timeout(config.per_item_timeout, work.fetch(item)).await {
            Ok(Ok(fetched)) => {
                return Outcome::success(item.clone(), worker, start.elapsed(), fetched.bytes);
            }
            Ok(Err(reason)) => last_reason = reason,
            Err(_) => last_reason = FailureReason::Timeout,
        }

        // A cancelled run finishes in-flight items but does not retry them.
        if token.is_cancelled() {
            break;
        }
        if attempt < config.retry.max_attempts {
            debug!(item = %item, attempt, "retrying failed item");
        }
    }

    Outcome::failure(item.clone(), worker, start.elapsed(), last_reason)
}

/// Runs one workload under one [`RunConfig`] and seals the result.
///
/// The runner owns the run lifecycle: it validates configuration,
/// starts the resource monitor, dispatches to the configured strategy,
/// stops the monitor, and seals the [`BenchmarkRun`]. A cancelled
/// runner stays cancelled; create a new runner per run.
pub struct WorkloadRunner {
    config: RunConfig,
    token: CancelToken,
}

impl WorkloadRunner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            token: CancelToken::new(),
        }
    }

    /// A handle that cancels this runner's run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute every item exactly once under the configured strategy.
    ///
    /// Returns a sealed run: `Complete` when every item has a terminal
    /// outcome, `Incomplete` when the run was cancelled first.
    pub fn run(&self, items: Vec<WorkItem>, work: Arc<dyn UnitOfWork>) -> Result<BenchmarkRun> {
        self.config.validate()?;

        let total_items = items.len();
        let items = Arc::new(items);
        let gauge = Arc::new(InFlightGauge::new());

        info!(
            strategy = %self.config.strategy,
            concurrency = self.config.concurrency,
            total_items,
            "starting benchmark run"
        );

        let mut monitor = ResourceMonitor::new(self.config.sample_interval);
        monitor.start();

        let started_at = unix_millis();
        let run_start = Instant::now();

        let dispatched = match self.config.strategy {
            StrategyKind::ThreadParallel => threaded::execute(
                Arc::clone(&items),
                Arc::clone(&work),
                &self.config,
                self.token.clone(),
                Arc::clone(&gauge),
            ),
            StrategyKind::BoundedConcurrent => bounded::execute(
                Arc::clone(&items),
                Arc::clone(&work),
                &self.config,
                self.token.clone(),
                Arc::clone(&gauge),
            ),
        };

        let wall_time = run_start.elapsed();
        monitor.stop();
        let samples = monitor.take_samples();

        let outcomes = dispatched?;
        let status = if !self.token.is_cancelled() && outcomes.len() == total_items {
            RunStatus::Complete
        } else {
            RunStatus::Incomplete
        };

        info!(
            ?status,
            outcomes = outcomes.len(),
            peak_in_flight = gauge.peak(),
            wall_secs = wall_time.as_secs_f64(),
            "benchmark run finished"
        );

        Ok(BenchmarkRun {
            config: self.config.clone(),
            status,
            total_items,
            cpu_cores: num_cpus::get(),
            started_at,
            wall_time,
            peak_in_flight: gauge.peak(),
            outcomes,
            samples,
        })
    }
}

/// Compact unique timestamp (unix milliseconds), good for filenames and JSON.
pub(crate) fn unix_millis() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::outcome::OutcomeStatus;
    use crate::workload::{generate_items, FetchFuture, Fetched, SimulatedFetch};
    use std::time::Duration;

    fn test_config() -> RunConfig {
        RunConfig::new()
            .concurrency(4)
            .per_item_timeout(Duration::from_millis(200))
            .sample_interval(Duration::from_millis(20))
    }

    fn instant_work() -> Arc<dyn UnitOfWork> {
        Arc::new(|_: &WorkItem| -> FetchFuture {
            Box::pin(async { Ok(Fetched { bytes: 1 }) })
        })
    }

    #[test]
    fn should_track_peak_in_flight() {
        let gauge = InFlightGauge::new();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
            assert_eq!(gauge.current(), 2);
        }
        let _c = gauge.enter();
        assert_eq!(gauge.current(), 1);
        assert_eq!(gauge.peak(), 2);
    }

    #[tokio::test]
    async fn should_record_timeout_when_work_hangs() {
        let work = |_: &WorkItem| -> FetchFuture {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Fetched { bytes: 0 })
            })
        };
        let config = RunConfig::new().per_item_timeout(Duration::from_millis(10));
        let token = CancelToken::new();
        let gauge = InFlightGauge::new();

        let outcome = process_item(
            &work,
            &WorkItem::new("slow"),
            0,
            &config,
            &token,
            &gauge,
        )
        .await;

        assert_eq!(
            outcome.status,
            OutcomeStatus::Failure {
                reason: FailureReason::Timeout
            }
        );
        assert_eq!(gauge.current(), 0, "gauge must be released on timeout");
    }

    #[tokio::test]
    async fn should_retry_until_attempts_exhausted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let work = move |_: &WorkItem| -> FetchFuture {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < 2 {
                    Err(FailureReason::Network("reset".into()))
                } else {
                    Ok(Fetched { bytes: 9 })
                }
            })
        };
        let config = RunConfig::new().retry(RetryPolicy::with_attempts(3));
        let token = CancelToken::new();
        let gauge = InFlightGauge::new();

        let outcome = process_item(&work, &WorkItem::new("flaky"), 0, &config, &token, &gauge).await;

        assert!(outcome.is_success(), "third attempt should have succeeded");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn should_reject_invalid_config_before_running() {
        let runner = WorkloadRunner::new(test_config().concurrency(0));
        let err = runner.run(generate_items(10), instant_work());
        assert!(err.is_err());
    }

    #[test]
    fn should_complete_zero_item_run() {
        let runner = WorkloadRunner::new(test_config());
        let run = runner.run(Vec::new(), instant_work()).unwrap();

        assert_eq!(run.status, RunStatus::Complete);
        assert_eq!(run.total_items, 0);
        assert!(run.outcomes.is_empty());
    }

    #[test]
    fn should_account_for_every_item_with_failures_injected() {
        // 1000 items, bounded gate of 50, ~10% failures, 10-30ms latency.
        let work = Arc::new(
            SimulatedFetch::new()
                .latency(Duration::from_millis(10), Duration::from_millis(30))
                .failure_probability(0.10),
        );
        let config = test_config()
            .strategy(StrategyKind::BoundedConcurrent)
            .concurrency(50);
        let runner = WorkloadRunner::new(config);

        let run = runner.run(generate_items(1000), work).unwrap();
        assert_eq!(run.status, RunStatus::Complete);
        assert_eq!(run.outcomes.len(), 1000);
        assert!(run.peak_in_flight <= 50, "gate exceeded: {}", run.peak_in_flight);

        let successes = run.outcomes.iter().filter(|o| o.is_success()).count();
        let failures = run.outcomes.len() - successes;
        assert_eq!(successes + failures, 1000);
        // 90% expected success rate, generous +-5% band.
        assert!(
            (850..=950).contains(&successes),
            "unexpected success count {}",
            successes
        );
    }

    #[test]
    fn should_finish_faster_with_wider_gate_on_wait_bound_workload() {
        let work = Arc::new(
            SimulatedFetch::new()
                .latency(Duration::from_millis(10), Duration::from_millis(20))
                .failure_probability(0.0),
        );
        let items = generate_items(400);

        let baseline = WorkloadRunner::new(
            test_config()
                .strategy(StrategyKind::ThreadParallel)
                .concurrency(10),
        )
        .run(items.clone(), work.clone())
        .unwrap();

        let candidate = WorkloadRunner::new(
            test_config()
                .strategy(StrategyKind::BoundedConcurrent)
                .concurrency(50),
        )
        .run(items, work)
        .unwrap();

        assert_eq!(baseline.outcomes.len(), 400);
        assert_eq!(candidate.outcomes.len(), 400);
        assert!(
            candidate.wall_time < baseline.wall_time,
            "bounded-concurrent ({:?}) should beat thread-parallel ({:?}) when waiting dominates",
            candidate.wall_time,
            baseline.wall_time
        );
    }

    #[test]
    fn should_seal_incomplete_when_cancelled_before_dispatch() {
        let runner = WorkloadRunner::new(
            test_config()
                .strategy(StrategyKind::BoundedConcurrent)
                .concurrency(2),
        );
        runner.cancel_token().cancel();

        let run = runner
            .run(generate_items(20), instant_work())
            .unwrap();

        assert_eq!(run.status, RunStatus::Incomplete);
        assert!(run.outcomes.len() < 20);
    }
}
