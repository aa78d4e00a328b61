//! Pluggable reporters for run and comparison output.

use crate::compare::ComparisonReport;
use crate::config::RunConfig;
use crate::metrics::RunMetrics;
use crate::outcome::BenchmarkRun;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

/// Trait for benchmark result reporters.
pub trait Reporter: Send + Sync {
    /// Called before a labelled run starts.
    fn run_start(&self, _label: &str, _config: &RunConfig) {}

    /// Called when a labelled run has been sealed and aggregated.
    fn run_end(&self, _label: &str, _run: &BenchmarkRun, _metrics: &RunMetrics) {}

    /// Called after both runs are compared.
    fn comparison_end(&self, _report: &ComparisonReport) {}
}

/// Console reporter that prints results to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    fn format_duration(d: std::time::Duration) -> String {
        if d.as_secs() > 0 {
            format!("{:.2}s", d.as_secs_f64())
        } else if d.as_millis() > 0 {
            format!("{:.2}ms", d.as_secs_f64() * 1000.0)
        } else {
            format!("{:.2}µs", d.as_secs_f64() * 1_000_000.0)
        }
    }

    fn format_bytes(bytes: f64) -> String {
        if bytes >= 1_000_000_000.0 {
            format!("{:.2} GB", bytes / 1_000_000_000.0)
        } else if bytes >= 1_000_000.0 {
            format!("{:.2} MB", bytes / 1_000_000.0)
        } else {
            format!("{:.2} KB", bytes / 1_000.0)
        }
    }
}

impl Reporter for ConsoleReporter {
    fn run_start(&self, label: &str, config: &RunConfig) {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("  Run: {}", label);
        eprintln!(
            "  Strategy: {}, Concurrency: {}",
            config.strategy, config.concurrency
        );
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        std::io::stderr().flush().ok();
    }

    fn run_end(&self, label: &str, run: &BenchmarkRun, metrics: &RunMetrics) {
        eprintln!(
            "  {} [{:?}]: {}/{} succeeded ({:.1}%) in {}",
            label,
            run.status,
            metrics.successes,
            metrics.total_items,
            metrics.success_rate * 100.0,
            Self::format_duration(metrics.wall_time),
        );
        eprintln!(
            "    {:.2} items/s, mean latency {}, {} transferred, peak in-flight {}",
            metrics.throughput,
            Self::format_duration(metrics.mean_latency),
            Self::format_bytes(metrics.total_bytes as f64),
            metrics.peak_in_flight,
        );
        eprintln!(
            "    cpu avg {:.1}% (peak {:.1}%), memory avg {}",
            metrics.cpu_avg_percent,
            metrics.cpu_peak_percent,
            Self::format_bytes(metrics.memory_avg_bytes),
        );
        if !metrics.failure_reasons.is_empty() {
            let reasons: Vec<_> = metrics
                .failure_reasons
                .iter()
                .map(|(reason, count)| format!("{}: {}", reason, count))
                .collect();
            eprintln!("    failures: {}", reasons.join(", "));
        }
    }

    fn comparison_end(&self, report: &ComparisonReport) {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!(
            "  Speedup: {:.2}x ({:+.2}s wall clock)",
            report.speedup, -report.time_saved_seconds
        );
        eprintln!(
            "  Throughput: {:+.1}%, Success rate: {:+.1} pp",
            report.throughput_delta_percent,
            report.success_rate_delta * 100.0
        );
        eprintln!(
            "  CPU: {:+.1} pp, Memory: {:+.2} MB",
            report.cpu_delta_percent,
            report.memory_delta_bytes / 1_000_000.0
        );
        eprintln!("  Recommendation: {}", report.recommendation);
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

/// A sealed run bundled with its aggregate, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    pub run: BenchmarkRun,
    pub metrics: RunMetrics,
}

impl RunArtifact {
    /// Load a previously written run artifact from JSON.
    pub fn load(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// JSON reporter that writes one file per run plus the comparison.
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn write(&self, filename: &str, value: &impl Serialize) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(filename);
        let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

impl Reporter for JsonReporter {
    fn run_end(&self, label: &str, run: &BenchmarkRun, metrics: &RunMetrics) {
        let artifact = RunArtifact {
            run: run.clone(),
            metrics: metrics.clone(),
        };
        let filename = format!("{}.json", label.replace(['/', ' '], "_"));
        match self.write(&filename, &artifact) {
            Ok(path) => eprintln!("  Results written to: {}", path.display()),
            Err(e) => eprintln!("Warning: failed to write JSON results: {}", e),
        }
    }

    fn comparison_end(&self, report: &ComparisonReport) {
        if let Err(e) = self.write("comparison.json", report) {
            eprintln!("Warning: failed to write comparison JSON: {}", e);
        }
    }
}

/// Combines multiple reporters.
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for MultiReporter {
    fn run_start(&self, label: &str, config: &RunConfig) {
        for r in &self.reporters {
            r.run_start(label, config);
        }
    }

    fn run_end(&self, label: &str, run: &BenchmarkRun, metrics: &RunMetrics) {
        for r in &self.reporters {
            r.run_end(label, run, metrics);
        }
    }

    fn comparison_end(&self, report: &ComparisonReport) {
        for r in &self.reporters {
            r.comparison_end(report);
        }
    }
}
