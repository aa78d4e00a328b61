//! Configuration for a benchmark run.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Which concurrency discipline executes the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// W OS threads, each processing a contiguous slice sequentially.
    ThreadParallel,
    /// One cooperative scheduler with at most K tasks in flight.
    BoundedConcurrent,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::ThreadParallel => "thread-parallel",
            StrategyKind::BoundedConcurrent => "bounded-concurrent",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "thread-parallel" | "threads" | "sync" => Ok(StrategyKind::ThreadParallel),
            "bounded-concurrent" | "bounded" | "async" => Ok(StrategyKind::BoundedConcurrent),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown strategy '{}' (expected thread-parallel or bounded-concurrent)",
                other
            ))),
        }
    }
}

/// How many times a failing item is attempted before its outcome is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per item, including the first. Must be at least 1.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

/// Parameters of one benchmark run. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Worker count (thread-parallel) or max in-flight tasks (bounded-concurrent).
    pub concurrency: usize,
    pub strategy: StrategyKind,
    /// Deadline for a single attempt at one item.
    #[serde(with = "crate::outcome::duration_serde")]
    pub per_item_timeout: Duration,
    pub retry: RetryPolicy,
    /// Cadence of the background resource sampler.
    #[serde(with = "crate::outcome::duration_serde")]
    pub sample_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get(),
            strategy: StrategyKind::ThreadParallel,
            per_item_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            sample_interval: Duration::from_millis(500),
        }
    }
}

impl RunConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from environment variables.
    ///
    /// Supported variables:
    /// - `FETCHBENCH_CONCURRENCY`: worker count / max in-flight
    /// - `FETCHBENCH_STRATEGY`: `thread-parallel` or `bounded-concurrent`
    /// - `FETCHBENCH_TIMEOUT_MS`: per-item timeout in milliseconds
    /// - `FETCHBENCH_RETRIES`: attempts per item
    /// - `FETCHBENCH_SAMPLE_INTERVAL_MS`: sampler cadence in milliseconds
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FETCHBENCH_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                cfg.concurrency = n;
            }
        }
        if let Ok(v) = std::env::var("FETCHBENCH_STRATEGY") {
            if let Ok(s) = v.parse() {
                cfg.strategy = s;
            }
        }
        if let Ok(v) = std::env::var("FETCHBENCH_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.per_item_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("FETCHBENCH_RETRIES") {
            if let Ok(n) = v.parse() {
                cfg.retry = RetryPolicy::with_attempts(n);
            }
        }
        if let Ok(v) = std::env::var("FETCHBENCH_SAMPLE_INTERVAL_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.sample_interval = Duration::from_millis(ms);
            }
        }

        cfg
    }

    /// Set the concurrency parameter.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Set the execution strategy.
    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the per-item timeout.
    pub fn per_item_timeout(mut self, timeout: Duration) -> Self {
        self.per_item_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the resource sampler cadence.
    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Reject unusable parameters before any work is dispatched.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfiguration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfiguration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.per_item_timeout.is_zero() {
            return Err(Error::InvalidConfiguration(
                "per_item_timeout must be non-zero".to_string(),
            ));
        }
        if self.sample_interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "sample_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_defaults_when_env_not_set() {
        let cfg = RunConfig::default();
        assert!(cfg.concurrency >= 1);
        assert_eq!(cfg.strategy, StrategyKind::ThreadParallel);
        assert_eq!(cfg.retry.max_attempts, 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn should_build_config_with_builder() {
        let cfg = RunConfig::new()
            .concurrency(50)
            .strategy(StrategyKind::BoundedConcurrent)
            .per_item_timeout(Duration::from_secs(5))
            .retry(RetryPolicy::with_attempts(3));

        assert_eq!(cfg.concurrency, 50);
        assert_eq!(cfg.strategy, StrategyKind::BoundedConcurrent);
        assert_eq!(cfg.per_item_timeout, Duration::from_secs(5));
        assert_eq!(cfg.retry.max_attempts, 3);
    }

    #[test]
    fn should_reject_zero_concurrency() {
        let cfg = RunConfig::new().concurrency(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn should_reject_zero_attempts_and_zero_timeout() {
        assert!(RunConfig::new()
            .retry(RetryPolicy::with_attempts(0))
            .validate()
            .is_err());
        assert!(RunConfig::new()
            .per_item_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn should_parse_strategy_aliases() {
        assert_eq!(
            "threads".parse::<StrategyKind>().unwrap(),
            StrategyKind::ThreadParallel
        );
        assert_eq!(
            "bounded".parse::<StrategyKind>().unwrap(),
            StrategyKind::BoundedConcurrent
        );
        assert!("fibers".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn should_round_trip_strategy_display() {
        let s = StrategyKind::BoundedConcurrent;
        assert_eq!(s.to_string().parse::<StrategyKind>().unwrap(), s);
    }
}
