//! Relative metrics between a baseline and a candidate run.

use crate::metrics::RunMetrics;
use serde::{Deserialize, Serialize};

/// Speedup thresholds separating recommendation tiers.
///
/// These are configuration, not per-call-site constants: construct one
/// set, apply it consistently. Classification is total over all
/// non-negative speedups, including 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Speedups above this are a strong recommendation.
    pub strong: f64,
    /// Speedups above this (and at most `strong`) are moderate.
    pub moderate: f64,
    /// Speedups above this (and at most `moderate`) are marginal.
    pub marginal: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            strong: 10.0,
            moderate: 5.0,
            marginal: 2.0,
        }
    }
}

impl TierThresholds {
    pub fn classify(&self, speedup: f64) -> Recommendation {
        if speedup > self.strong {
            Recommendation::Strong
        } else if speedup > self.moderate {
            Recommendation::Moderate
        } else if speedup > self.marginal {
            Recommendation::Marginal
        } else {
            Recommendation::None
        }
    }
}

/// How strongly the candidate configuration is recommended over the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Strong,
    Moderate,
    Marginal,
    None,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::Strong => "strong",
            Recommendation::Moderate => "moderate",
            Recommendation::Marginal => "marginal",
            Recommendation::None => "none",
        };
        f.write_str(s)
    }
}

/// Derived comparison between two sealed runs. Never mutates its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// `baseline.wall_time / candidate.wall_time`; 0 when the candidate
    /// duration is 0.
    pub speedup: f64,
    /// Wall-clock seconds saved by the candidate (negative if slower).
    pub time_saved_seconds: f64,
    /// Candidate throughput relative to baseline, in percent.
    pub throughput_delta_percent: f64,
    /// `candidate.success_rate - baseline.success_rate`.
    pub success_rate_delta: f64,
    /// Average CPU percentage points added by the candidate.
    pub cpu_delta_percent: f64,
    /// Average memory bytes added by the candidate.
    pub memory_delta_bytes: f64,
    pub recommendation: Recommendation,
}

/// Compares run metrics under one fixed set of tier thresholds.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    tiers: TierThresholds,
}

impl Comparator {
    pub fn new(tiers: TierThresholds) -> Self {
        Self { tiers }
    }

    pub fn compare(&self, baseline: &RunMetrics, candidate: &RunMetrics) -> ComparisonReport {
        let baseline_secs = baseline.wall_time.as_secs_f64();
        let candidate_secs = candidate.wall_time.as_secs_f64();

        let speedup = if candidate_secs > 0.0 {
            baseline_secs / candidate_secs
        } else {
            0.0
        };

        let throughput_delta_percent = if baseline.throughput > 0.0 {
            (candidate.throughput / baseline.throughput - 1.0) * 100.0
        } else {
            0.0
        };

        ComparisonReport {
            speedup,
            time_saved_seconds: baseline_secs - candidate_secs,
            throughput_delta_percent,
            success_rate_delta: candidate.success_rate - baseline.success_rate,
            cpu_delta_percent: candidate.cpu_avg_percent - baseline.cpu_avg_percent,
            memory_delta_bytes: candidate.memory_avg_bytes - baseline.memory_avg_bytes,
            recommendation: self.tiers.classify(speedup),
        }
    }
}
