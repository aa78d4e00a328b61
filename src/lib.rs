//! # fetchbench
//!
//! A harness for measuring and comparing concurrency strategies over one
//! bulk fetch workload: many independent, possibly-slow, possibly-failing
//! operations.
//!
//! The same item set runs under one of two disciplines (OS-thread
//! workers over contiguous slices, or a single cooperative scheduler
//! with a bounded number of in-flight tasks) while a background
//! sampler records CPU, memory, and network usage. Each run seals into
//! a [`BenchmarkRun`], aggregates into [`RunMetrics`], and two runs
//! compare into a [`ComparisonReport`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fetchbench::{
//!     aggregate, generate_items, Comparator, RunConfig, SimulatedFetch, StrategyKind,
//!     WorkloadRunner,
//! };
//! use std::sync::Arc;
//!
//! fn main() -> fetchbench::Result<()> {
//!     let items = generate_items(1000);
//!     let work = Arc::new(SimulatedFetch::default());
//!
//!     let baseline = WorkloadRunner::new(
//!         RunConfig::new()
//!             .strategy(StrategyKind::ThreadParallel)
//!             .concurrency(10),
//!     )
//!     .run(items.clone(), work.clone())?;
//!
//!     let candidate = WorkloadRunner::new(
//!         RunConfig::new()
//!             .strategy(StrategyKind::BoundedConcurrent)
//!             .concurrency(50),
//!     )
//!     .run(items, work)?;
//!
//!     let report = Comparator::default().compare(&aggregate(&baseline), &aggregate(&candidate));
//!     println!("speedup: {:.2}x", report.speedup);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **`hdr`**: HDR histogram latency percentiles over successful outcomes

mod bounded;
mod compare;
mod config;
mod error;
mod metrics;
mod monitor;
mod outcome;
mod partition;
mod report;
mod runner;
mod threaded;
mod workload;

pub use compare::{Comparator, ComparisonReport, Recommendation, TierThresholds};
pub use config::{RetryPolicy, RunConfig, StrategyKind};
pub use error::{Error, Result};
pub use metrics::{aggregate, RunMetrics};
pub use monitor::{MonitorStats, ResourceMonitor};
pub use outcome::{
    BenchmarkRun, FailureReason, NetworkCounters, Outcome, OutcomeStatus, RunStatus, SampleRecord,
};
pub use partition::partition;
pub use report::{ConsoleReporter, JsonReporter, MultiReporter, Reporter, RunArtifact};
pub use runner::{CancelToken, WorkloadRunner};
pub use workload::{
    generate_items, FetchFuture, FetchResult, Fetched, SimulatedFetch, UnitOfWork, WorkItem,
};

#[cfg(feature = "hdr")]
pub mod histogram;
