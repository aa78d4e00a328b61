//! Per-item outcomes, resource samples, and the sealed run record.

use crate::config::RunConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::workload::WorkItem;

/// Why a work item failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The unit of work did not produce a result within the per-item timeout.
    Timeout,
    /// The remote side refused the request (throttling, bans).
    RateLimited,
    /// Transport-level failure with the underlying error text.
    Network(String),
    /// The owning worker or task died before the item finished.
    WorkerAborted,
}

impl FailureReason {
    /// Stable key for the failure-reason histogram.
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::Network(_) => "network",
            FailureReason::WorkerAborted => "worker_aborted",
        }
    }
}

/// Terminal state of one processed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success { bytes: u64 },
    Failure { reason: FailureReason },
}

/// Result of processing one [`WorkItem`]. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// The item this outcome belongs to.
    pub item: WorkItem,
    /// Id of the worker (thread strategy) or task (bounded strategy) that owned it.
    pub worker: usize,
    /// Time spent processing, across all retry attempts.
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
    pub status: OutcomeStatus,
}

impl Outcome {
    pub fn success(item: WorkItem, worker: usize, elapsed: Duration, bytes: u64) -> Self {
        Self {
            item,
            worker,
            elapsed,
            status: OutcomeStatus::Success { bytes },
        }
    }

    pub fn failure(item: WorkItem, worker: usize, elapsed: Duration, reason: FailureReason) -> Self {
        Self {
            item,
            worker,
            elapsed,
            status: OutcomeStatus::Failure { reason },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    /// Payload size, zero for failures.
    pub fn bytes(&self) -> u64 {
        match self.status {
            OutcomeStatus::Success { bytes } => bytes,
            OutcomeStatus::Failure { .. } => 0,
        }
    }
}

/// Cumulative network counters at sample time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// One timestamped system-resource observation.
///
/// Produced only by the sampling loop; `elapsed` is relative to the
/// monitor's own start and is non-decreasing across a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkCounters>,
}

/// Whether a run saw every item through to a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every input item has exactly one outcome.
    Complete,
    /// The run was cancelled; outcomes cover only what finished.
    Incomplete,
}

/// The sealed record of one full execution under one [`RunConfig`].
///
/// Built incrementally by the engine, read-only once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub config: RunConfig,
    pub status: RunStatus,
    /// Number of input items submitted to the run.
    pub total_items: usize,
    /// CPU cores available on the host during the run.
    pub cpu_cores: usize,
    /// Unix timestamp in milliseconds when the run started.
    pub started_at: String,
    /// Wall-clock duration of the whole run.
    #[serde(with = "duration_serde")]
    pub wall_time: Duration,
    /// Highest number of items observed in flight at once.
    pub peak_in_flight: usize,
    /// One terminal outcome per processed item, in no particular order.
    pub outcomes: Vec<Outcome>,
    /// Resource samples, ordered by timestamp.
    pub samples: Vec<SampleRecord>,
}

impl BenchmarkRun {
    /// Load a previously saved run from JSON.
    pub fn load(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// True when every submitted item reached a terminal outcome.
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }
}

pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_nanos().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = u128::deserialize(d)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}
