//! Background system-resource sampler.
//!
//! The monitor always samples on its own OS thread, so resource
//! measurement never contends with the workload's scheduling model.
//! Lifecycle is `Idle -> Sampling -> Stopped`; a monitor is coupled to
//! one run and is not restartable.

use crate::outcome::{NetworkCounters, SampleRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Networks, System};
use tracing::{debug, warn};

/// How long `stop` waits for the sampling loop before giving up on it.
/// A missed join degrades sample completeness; it is never fatal.
const JOIN_WAIT: Duration = Duration::from_secs(2);

/// Granularity at which the loop re-checks the stop flag while waiting
/// out its interval, so `stop` is observed promptly.
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Idle,
    Sampling,
    Stopped,
}

/// Samples CPU, memory, and network counters on a fixed cadence.
pub struct ResourceMonitor {
    interval: Duration,
    state: MonitorState,
    samples: Arc<Mutex<Vec<SampleRecord>>>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    done_rx: Option<mpsc::Receiver<()>>,
}

impl ResourceMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: MonitorState::Idle,
            samples: Arc::new(Mutex::new(Vec::new())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            handle: None,
            done_rx: None,
        }
    }

    /// Spawn the sampling loop. No-op unless the monitor is `Idle`.
    pub fn start(&mut self) {
        if self.state != MonitorState::Idle {
            warn!(state = ?self.state, "resource monitor start ignored");
            return;
        }
        self.state = MonitorState::Sampling;

        let interval = self.interval;
        let samples = Arc::clone(&self.samples);
        let stop_flag = Arc::clone(&self.stop_flag);
        let (done_tx, done_rx) = mpsc::channel();
        self.done_rx = Some(done_rx);

        let spawned = thread::Builder::new()
            .name("fetchbench-sampler".to_string())
            .spawn(move || {
                sampling_loop(interval, &samples, &stop_flag);
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                // The run proceeds without resource data.
                warn!(error = %e, "failed to spawn resource sampler");
                self.state = MonitorState::Stopped;
            }
        }
    }

    /// Signal the loop to exit and wait for it with a bounded join.
    ///
    /// On a missed join the loop thread is abandoned and whatever
    /// samples it already appended are kept.
    pub fn stop(&mut self) {
        if self.state != MonitorState::Sampling {
            return;
        }
        self.state = MonitorState::Stopped;
        self.stop_flag.store(true, Ordering::Release);

        let joined = match self.done_rx.take() {
            Some(rx) => rx.recv_timeout(JOIN_WAIT).is_ok(),
            None => false,
        };

        match self.handle.take() {
            Some(handle) if joined => {
                let _ = handle.join();
            }
            Some(_) => {
                let kept = self.sample_count();
                warn!(
                    kept_samples = kept,
                    "resource sampler did not stop within {:?}; keeping collected samples",
                    JOIN_WAIT
                );
            }
            None => {}
        }
    }

    pub fn is_sampling(&self) -> bool {
        self.state == MonitorState::Sampling
    }

    fn sample_count(&self) -> usize {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Aggregate the collected samples, or `None` when nothing was sampled.
    ///
    /// Only meaningful after [`stop`](Self::stop); while sampling the
    /// result is a racy snapshot.
    pub fn stats(&self) -> Option<MonitorStats> {
        if self.state == MonitorState::Sampling {
            warn!("stats requested while still sampling");
        }
        MonitorStats::from_samples(&self.samples.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Take ownership of the collected samples. Call after [`stop`](Self::stop).
    pub fn take_samples(&mut self) -> Vec<SampleRecord> {
        if self.state == MonitorState::Sampling {
            warn!("take_samples called while still sampling; stopping first");
            self.stop();
        }
        std::mem::take(&mut *self.samples.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        // Sequential runs must not leak sampler threads.
        if self.state == MonitorState::Sampling {
            self.stop();
        }
    }
}

fn sampling_loop(interval: Duration, samples: &Mutex<Vec<SampleRecord>>, stop_flag: &AtomicBool) {
    let origin = Instant::now();
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu_usage();
    let mut networks = Networks::new_with_refreshed_list();

    debug!(?interval, "resource sampler started");

    loop {
        let wait_start = Instant::now();
        while wait_start.elapsed() < interval {
            if stop_flag.load(Ordering::Acquire) {
                debug!("resource sampler stopping");
                return;
            }
            thread::sleep(STOP_POLL.min(interval));
        }

        sys.refresh_cpu_usage();
        sys.refresh_memory();
        networks.refresh();

        let (sent, received) = networks
            .iter()
            .fold((0u64, 0u64), |(tx, rx), (_name, data)| {
                (tx + data.total_transmitted(), rx + data.total_received())
            });

        let record = SampleRecord {
            elapsed: origin.elapsed(),
            cpu_percent: sys.global_cpu_usage(),
            memory_used_bytes: sys.used_memory(),
            network: Some(NetworkCounters {
                bytes_sent: sent,
                bytes_received: received,
            }),
        };

        samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

/// Pure aggregation over collected samples: avg/min/max for CPU and
/// memory, plus first-to-last network deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStats {
    pub sample_count: usize,
    pub cpu_avg_percent: f64,
    pub cpu_max_percent: f64,
    pub cpu_min_percent: f64,
    pub memory_avg_bytes: f64,
    pub memory_max_bytes: u64,
    pub memory_min_bytes: u64,
    /// Bytes sent during the sampled window.
    pub network_sent_bytes: u64,
    /// Bytes received during the sampled window.
    pub network_received_bytes: u64,
}

impl MonitorStats {
    /// Aggregate samples, or `None` when there is nothing to aggregate.
    pub fn from_samples(samples: &[SampleRecord]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f64;
        let cpu_sum: f64 = samples.iter().map(|s| s.cpu_percent as f64).sum();
        let mem_sum: f64 = samples.iter().map(|s| s.memory_used_bytes as f64).sum();

        let (sent, received) = match (
            samples.iter().find_map(|s| s.network),
            samples.iter().rev().find_map(|s| s.network),
        ) {
            (Some(first), Some(last)) => (
                last.bytes_sent.saturating_sub(first.bytes_sent),
                last.bytes_received.saturating_sub(first.bytes_received),
            ),
            _ => (0, 0),
        };

        Some(Self {
            sample_count: samples.len(),
            cpu_avg_percent: cpu_sum / n,
            cpu_max_percent: samples
                .iter()
                .map(|s| s.cpu_percent as f64)
                .fold(f64::MIN, f64::max),
            cpu_min_percent: samples
                .iter()
                .map(|s| s.cpu_percent as f64)
                .fold(f64::MAX, f64::min),
            memory_avg_bytes: mem_sum / n,
            memory_max_bytes: samples.iter().map(|s| s.memory_used_bytes).max().unwrap_or(0),
            memory_min_bytes: samples.iter().map(|s| s.memory_used_bytes).min().unwrap_or(0),
            network_sent_bytes: sent,
            network_received_bytes: received,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(elapsed_ms: u64, cpu: f32, mem: u64) -> SampleRecord {
        SampleRecord {
            elapsed: Duration::from_millis(elapsed_ms),
            cpu_percent: cpu,
            memory_used_bytes: mem,
            network: None,
        }
    }

    #[test]
    fn should_collect_samples_while_running() {
        let mut monitor = ResourceMonitor::new(Duration::from_millis(10));
        monitor.start();
        thread::sleep(Duration::from_millis(80));
        monitor.stop();

        let stats = monitor.stats();
        let samples = monitor.take_samples();
        assert!(
            !samples.is_empty(),
            "expected at least one sample after 80ms at 10ms cadence"
        );
        assert_eq!(stats.unwrap().sample_count, samples.len());
        for pair in samples.windows(2) {
            assert!(pair[0].elapsed <= pair[1].elapsed, "samples out of order");
        }
    }

    #[test]
    fn should_ignore_double_start_and_double_stop() {
        let mut monitor = ResourceMonitor::new(Duration::from_millis(10));
        monitor.start();
        monitor.start();
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_sampling());
    }

    #[test]
    fn should_return_no_data_for_zero_samples() {
        assert_eq!(MonitorStats::from_samples(&[]), None);
    }

    #[test]
    fn should_aggregate_cpu_and_memory_extremes() {
        let stats = MonitorStats::from_samples(&[
            sample(0, 10.0, 100),
            sample(500, 30.0, 300),
            sample(1000, 20.0, 200),
        ])
        .unwrap();

        assert_eq!(stats.sample_count, 3);
        assert!((stats.cpu_avg_percent - 20.0).abs() < 1e-9);
        assert_eq!(stats.cpu_max_percent, 30.0);
        assert_eq!(stats.cpu_min_percent, 10.0);
        assert_eq!(stats.memory_max_bytes, 300);
        assert_eq!(stats.memory_min_bytes, 100);
        assert!((stats.memory_avg_bytes - 200.0).abs() < 1e-9);
    }

    #[test]
    fn should_compute_network_deltas_between_first_and_last() {
        let mut first = sample(0, 0.0, 0);
        first.network = Some(NetworkCounters {
            bytes_sent: 100,
            bytes_received: 1_000,
        });
        let mut last = sample(500, 0.0, 0);
        last.network = Some(NetworkCounters {
            bytes_sent: 350,
            bytes_received: 5_000,
        });

        let stats = MonitorStats::from_samples(&[first, last]).unwrap();
        assert_eq!(stats.network_sent_bytes, 250);
        assert_eq!(stats.network_received_bytes, 4_000);
    }
}
