//! queuesim - cafeteria queueing simulation
//!
//! Runs a batch of independent simulation runs, writes one CSV row per run
//! and prints the cross-run averages.
//!
//! ```bash
//! queuesim --runs 100 --seed 2024 --output results.csv
//! queuesim --config scenario.toml --summary-json summary.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use queuesim::core::init_simulation_logging_with_level;
use queuesim::metrics::export::{export_csv, export_json};
use queuesim::metrics::BatchSummary;
use queuesim::{run_batch, BatchConfiguration, Parallelism, QueueSimError};

/// Cafeteria queueing simulation
#[derive(Parser, Debug)]
#[command(name = "queuesim")]
#[command(about = "Estimate cafeteria queue delays, throughput and revenue over many simulation runs")]
#[command(version)]
struct Args {
    /// TOML configuration file; built-in defaults describe the standard cafeteria
    #[arg(long, env = "QUEUESIM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of independent runs
    #[arg(long, env = "QUEUESIM_RUNS")]
    runs: Option<usize>,

    /// Base seed the per-run seeds are derived from
    #[arg(long, env = "QUEUESIM_SEED")]
    seed: Option<u64>,

    /// CSV file receiving one row per run
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON file receiving the cross-run averages
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Execute runs one after another instead of in parallel
    #[arg(long)]
    sequential: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn batch_configuration(&self) -> Result<BatchConfiguration, QueueSimError> {
        let mut batch = match &self.config {
            Some(path) => BatchConfiguration::load(path)?,
            None => BatchConfiguration::default(),
        };
        if let Some(runs) = self.runs {
            batch.runs = runs;
        }
        if let Some(seed) = self.seed {
            batch.seed = seed;
        }
        if let Some(output) = &self.output {
            batch.output = output.clone();
        }
        if let Some(summary_json) = &self.summary_json {
            batch.summary_json = Some(summary_json.clone());
        }
        Ok(batch)
    }
}

fn run(args: &Args) -> Result<bool, QueueSimError> {
    let batch = args.batch_configuration()?;
    batch.validate()?;

    let parallelism = if args.sequential {
        Parallelism::Sequential
    } else {
        Parallelism::Parallel
    };
    let outcome = run_batch(&batch, parallelism);

    export_csv(&outcome.reports, &batch.output)?;
    info!(path = %batch.output.display(), rows = outcome.reports.len(), "Results written");

    let summary = BatchSummary::from_rows(&outcome.reports);
    println!("{summary}");

    if let Some(path) = &batch.summary_json {
        export_json(&summary, path, true)?;
        info!(path = %path.display(), "Summary written");
    }

    for failure in &outcome.failures {
        eprintln!("run {} (seed {}) failed: {}", failure.run, failure.seed, failure.error);
    }
    Ok(outcome.is_complete())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_simulation_logging_with_level(&args.log_level);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
