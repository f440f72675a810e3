//! Single runs and batches of independent runs.
//!
//! Every run builds its own simulation, stations, metrics and random stream,
//! so runs share nothing and can execute on any thread. A batch derives each
//! run's seed from the batch seed and the run index, which makes the results
//! independent of the execution order.

use rayon::prelude::*;
use tracing::{info, instrument, warn};

use queuesim_core::async_runtime::{self, DesRuntime};
use queuesim_core::logging::{diagnostics, events, run_span};
use queuesim_core::{derive_seed, RandomProvider, RandomStream, SimTime, Simulation};
use queuesim_metrics::RunMetrics;

use crate::cafeteria::Cafeteria;
use crate::category::Category;
use crate::config::{BatchConfiguration, RunConfiguration};
use crate::error::QueueSimError;
use crate::report::RunReport;

/// How the runs of a batch are scheduled onto threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// One run per rayon worker at a time.
    #[default]
    Parallel,
    Sequential,
}

/// A run that ended with an error.
#[derive(Debug)]
pub struct RunFailure {
    pub run: usize,
    pub seed: u64,
    pub error: QueueSimError,
}

/// Results of a batch, in run order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<RunReport>,
    pub failures: Vec<RunFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Finished {
    metrics: RunMetrics<Category>,
    final_time: SimTime,
    discarded_events: usize,
}

fn simulate<R: RandomProvider + 'static>(config: &RunConfiguration, random: R) -> Result<Finished, QueueSimError> {
    let horizon = config.horizon()?;
    let mut sim = Simulation::default();
    let cafeteria = Cafeteria::new(config, sim.clock(), random)?;

    let mut runtime = DesRuntime::new();
    cafeteria.open(&mut runtime);
    async_runtime::install(&mut sim, runtime);
    sim.run_until(horizon)?;

    let finished = Finished {
        metrics: cafeteria.metrics(),
        final_time: sim.time(),
        discarded_events: sim.scheduler().pending_events(),
    };
    // Suspended customers are dropped with the simulation and never resumed.
    drop(sim);
    Ok(finished)
}

/// Run `config` once with a random stream seeded from `config.seed`.
pub fn run_once(config: &RunConfiguration) -> Result<RunMetrics<Category>, QueueSimError> {
    run_with_provider(config, RandomStream::new(config.seed))
}

/// Run `config` once, drawing from `random`.
#[instrument(skip(config, random), fields(seed = config.seed))]
pub fn run_with_provider<R: RandomProvider + 'static>(
    config: &RunConfiguration,
    random: R,
) -> Result<RunMetrics<Category>, QueueSimError> {
    simulate(config, random).map(|finished| finished.metrics)
}

/// Run the batch with seeded random streams.
pub fn run_batch(batch: &BatchConfiguration, parallelism: Parallelism) -> BatchOutcome {
    run_batch_with(batch, parallelism, |_, seed| RandomStream::new(seed))
}

/// Run the batch, creating each run's random provider with
/// `provider(run_index, seed)`.
///
/// A failing run is logged and recorded in [`BatchOutcome::failures`]; the
/// other runs are unaffected.
pub fn run_batch_with<R, F>(batch: &BatchConfiguration, parallelism: Parallelism, provider: F) -> BatchOutcome
where
    R: RandomProvider + 'static,
    F: Fn(usize, u64) -> R + Sync,
{
    info!(runs = batch.runs, seed = batch.seed, ?parallelism, "Starting batch");

    let execute = |run: usize| -> Result<RunReport, RunFailure> {
        let seed = derive_seed(batch.seed, run as u64);
        let _span = run_span(run, seed).entered();
        let config = batch.run.with_seed(seed);

        let outcome = config
            .horizon()
            .map_err(QueueSimError::from)
            .and_then(|horizon| {
                events::run_started(run, seed, horizon);
                simulate(&config, provider(run, seed))
            })
            .map(|finished| {
                events::run_completed(run, finished.final_time, finished.discarded_events);
                RunReport::from_metrics(run, seed, &finished.metrics, &batch.revenue)
            });

        outcome.map_err(|error| {
            diagnostics::run_failed(run, &error);
            RunFailure { run, seed, error }
        })
    };

    let results: Vec<Result<RunReport, RunFailure>> = match parallelism {
        Parallelism::Parallel => (0..batch.runs).into_par_iter().map(execute).collect(),
        Parallelism::Sequential => (0..batch.runs).map(execute).collect(),
    };

    let mut outcome = BatchOutcome::default();
    for result in results {
        match result {
            Ok(report) => outcome.reports.push(report),
            Err(failure) => outcome.failures.push(failure),
        }
    }

    if outcome.is_complete() {
        info!(runs = outcome.reports.len(), "Batch completed");
    } else {
        warn!(
            succeeded = outcome.reports.len(),
            failed = outcome.failures.len(),
            "Batch completed with failed runs"
        );
    }
    outcome
}
