//! fetchbench: run one workload under two concurrency strategies and
//! compare the results.
//!
//! The binary is a thin driver around the library: it builds a synthetic
//! item set and a simulated fetch, executes the baseline and candidate
//! configurations back to back, and hands everything to the reporters.
//! Swap [`SimulatedFetch`] for a real fetch to benchmark live traffic.

use anyhow::{Context, Result};
use clap::Parser;
use fetchbench::{
    aggregate, generate_items, Comparator, ConsoleReporter, JsonReporter, MultiReporter,
    Reporter, RetryPolicy, RunConfig, SimulatedFetch, StrategyKind, TierThresholds, UnitOfWork,
    WorkloadRunner,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "fetchbench",
    about = "Compare concurrency strategies over a bulk fetch workload",
    long_about = "
fetchbench runs the same set of fetch items under two concurrency
configurations (a baseline and a candidate) while sampling CPU, memory,
and network usage, then reports comparable metrics and a recommendation.

Example:
    fetchbench --items 1000 \\
        --baseline thread-parallel --baseline-concurrency 10 \\
        --candidate bounded-concurrent --candidate-concurrency 50
"
)]
struct Cli {
    /// Number of synthetic items to fetch in each run
    #[arg(long, default_value_t = 1000)]
    items: usize,

    /// Baseline strategy (thread-parallel or bounded-concurrent)
    #[arg(long, default_value = "thread-parallel")]
    baseline: String,

    /// Baseline worker count / max in-flight (default: CPU cores)
    #[arg(long)]
    baseline_concurrency: Option<usize>,

    /// Candidate strategy (thread-parallel or bounded-concurrent)
    #[arg(long, default_value = "bounded-concurrent")]
    candidate: String,

    /// Candidate worker count / max in-flight
    #[arg(long, default_value_t = 50)]
    candidate_concurrency: usize,

    /// Per-item timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Attempts per item, including the first
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Resource sampler cadence in milliseconds
    #[arg(long, default_value_t = 500)]
    sample_interval_ms: u64,

    /// Simulated per-item failure probability in [0, 1]
    #[arg(long, default_value_t = 0.10)]
    fail_rate: f64,

    /// Minimum simulated latency in milliseconds
    #[arg(long, default_value_t = 10)]
    latency_min_ms: u64,

    /// Maximum simulated latency in milliseconds
    #[arg(long, default_value_t = 30)]
    latency_max_ms: u64,

    /// Output directory for JSON results
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Quiet mode (no console summary)
    #[arg(long, short = 'q')]
    quiet: bool,
}

impl Cli {
    fn run_config(&self, strategy: StrategyKind, concurrency: usize) -> RunConfig {
        RunConfig::new()
            .strategy(strategy)
            .concurrency(concurrency)
            .per_item_timeout(Duration::from_millis(self.timeout_ms))
            .retry(RetryPolicy::with_attempts(self.retries))
            .sample_interval(Duration::from_millis(self.sample_interval_ms))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let baseline_strategy: StrategyKind = cli
        .baseline
        .parse()
        .context("invalid --baseline strategy")?;
    let candidate_strategy: StrategyKind = cli
        .candidate
        .parse()
        .context("invalid --candidate strategy")?;
    let baseline_concurrency = cli.baseline_concurrency.unwrap_or_else(num_cpus::get);

    let mut reporters: Vec<Box<dyn Reporter>> = Vec::new();
    if !cli.quiet {
        reporters.push(Box::new(ConsoleReporter::new()));
    }
    if let Some(dir) = &cli.output_dir {
        reporters.push(Box::new(JsonReporter::new(dir)));
    }
    let reporter = MultiReporter::new(reporters);

    let items = generate_items(cli.items);
    let work: Arc<dyn UnitOfWork> = Arc::new(
        SimulatedFetch::new()
            .latency(
                Duration::from_millis(cli.latency_min_ms),
                Duration::from_millis(cli.latency_max_ms),
            )
            .failure_probability(cli.fail_rate),
    );

    let baseline_config = cli.run_config(baseline_strategy, baseline_concurrency);
    let baseline_label = format!("baseline-{}", baseline_strategy);
    reporter.run_start(&baseline_label, &baseline_config);
    let baseline_run = WorkloadRunner::new(baseline_config)
        .run(items.clone(), Arc::clone(&work))
        .context("baseline run failed")?;
    let baseline_metrics = aggregate(&baseline_run);
    reporter.run_end(&baseline_label, &baseline_run, &baseline_metrics);

    let candidate_config = cli.run_config(candidate_strategy, cli.candidate_concurrency);
    let candidate_label = format!("candidate-{}", candidate_strategy);
    reporter.run_start(&candidate_label, &candidate_config);
    let candidate_run = WorkloadRunner::new(candidate_config)
        .run(items, work)
        .context("candidate run failed")?;
    let candidate_metrics = aggregate(&candidate_run);
    reporter.run_end(&candidate_label, &candidate_run, &candidate_metrics);

    let report =
        Comparator::new(TierThresholds::default()).compare(&baseline_metrics, &candidate_metrics);
    reporter.comparison_end(&report);

    Ok(())
}
