//! Structured logging for simulation runs
//!
//! All crates of the workspace log through `tracing`. This module installs a
//! `tracing-subscriber` formatter and provides the spans and event helpers
//! shared by the kernel and the model.
//!
//! # Controlling output
//!
//! ```rust
//! use queuesim_core::init_simulation_logging_with_level;
//! init_simulation_logging_with_level("debug");
//! ```
//!
//! `RUST_LOG` takes precedence over the level passed in:
//!
//! ```bash
//! RUST_LOG=queuesim_core::resource=trace queuesim --runs 1
//! ```
//!
//! # Log Level Guidelines
//! - **TRACE**: every scheduled event, resumption and resource hand-over
//! - **DEBUG**: process lifecycle and runtime polls
//! - **INFO**: run and batch progress
//! - **WARN**: aborted runs and undefined statistics
//! - **ERROR**: failures that end a batch

use std::fmt::Display;

use crate::{ProcessId, SimTime};
use tracing::{debug, info, warn, Span};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging at `info` level.
pub fn init_simulation_logging() {
    init_simulation_logging_with_level("info")
}

/// Initialize logging with a specific level
///
/// # Arguments
/// * `level` - Log level: "trace", "debug", "info", "warn", or "error"
///
/// Installing a second subscriber is a no-op, so this is safe to call from
/// tests and binaries alike.
pub fn init_simulation_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("queuesim={level},queuesim_core={level},queuesim_metrics={level}").into()
    });

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .try_init();

    match installed {
        Ok(()) => info!("Simulation logging initialized at level: {}", level),
        Err(_) => debug!("Logging already initialized"),
    }
}

/// Verbose, pretty-printed logging for debugging a single run.
pub fn init_detailed_simulation_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "queuesim=trace,queuesim_core=trace,queuesim_metrics=debug".into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init();

    if installed.is_ok() {
        info!("Detailed simulation logging initialized");
    }
}

/// Span covering one independent run of a batch.
pub fn run_span(run: usize, seed: u64) -> Span {
    tracing::info_span!("run", run, seed)
}

/// Span covering one resumption of a logical process.
pub fn process_span(process: ProcessId, time: SimTime) -> Span {
    tracing::trace_span!("process", %process, %time)
}

/// Logging utilities for common simulation events
pub mod events {
    use super::*;

    pub fn run_started(run: usize, seed: u64, horizon: SimTime) {
        debug!(run, seed, %horizon, "Run started");
    }

    pub fn run_completed(run: usize, final_time: SimTime, discarded_events: usize) {
        debug!(run, %final_time, discarded_events, "Run completed");
    }

    pub fn process_spawned(process: ProcessId, time: SimTime) {
        tracing::trace!(%process, %time, "Process spawned");
    }

    pub fn process_completed(process: ProcessId, time: SimTime) {
        tracing::trace!(%process, %time, "Process completed");
    }
}

/// Logging utilities for error conditions and warnings
pub mod diagnostics {
    use super::*;

    /// A run ended with a fatal error; the rest of the batch carries on.
    pub fn run_failed(run: usize, error: &dyn Display) {
        warn!(run, %error, "Run aborted");
    }

    /// A statistic had no samples after the warm-up window.
    pub fn empty_sample(run: usize, statistic: &str) {
        warn!(run, statistic, "No samples recorded after warm-up; statistic is undefined");
    }
}

/// Log with the simulation time attached as a field.
#[macro_export]
macro_rules! sim_log_with_time {
    ($level:ident, $time:expr, $($arg:tt)*) => {
        tracing::$level!(time = %$time, $($arg)*)
    };
}
