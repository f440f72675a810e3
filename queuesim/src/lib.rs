//! # queuesim - cafeteria queueing simulation
//!
//! Customers arrive at a cafeteria, pick one of four service paths, queue for
//! a limited number of staff, are served and leave. Many independent runs
//! estimate steady-state queue delays, throughput per path and revenue.
//!
//! The crate is split in three layers:
//!
//! - [`core`]: the discrete event kernel (clock, event queue, processes,
//!   capacity resources, random draws).
//! - [`metrics`]: warm-up gated run metrics, summaries and CSV/JSON export.
//! - this crate: the cafeteria model, its configuration and the batch runner.
//!
//! ## Quick Start
//!
//! ```rust
//! use queuesim::prelude::*;
//!
//! let mut config = RunConfiguration::default();
//! config.duration = 600.0;
//! let metrics = run_once(&config).unwrap();
//! assert!(metrics.count(Category::FullMenu) > 0);
//! ```

pub use queuesim_core as core;

pub use queuesim_metrics as metrics;

pub mod cafeteria;
pub mod category;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;

pub use cafeteria::Cafeteria;
pub use category::Category;
pub use config::{BatchConfiguration, CategoryValues, QueuedValues, RunConfiguration};
pub use error::QueueSimError;
pub use report::RunReport;
pub use runner::{run_batch, run_batch_with, run_once, run_with_provider, BatchOutcome, Parallelism, RunFailure};

// Convenience re-exports of commonly used items
pub mod prelude {
    //! Commonly used types and functions

    pub use queuesim_core::{RandomProvider, RandomStream, SimTime, Simulation};

    pub use queuesim_metrics::{BatchSummary, RunMetrics, TableRow};

    pub use crate::{
        run_batch, run_once, BatchConfiguration, BatchOutcome, Category, Parallelism, QueueSimError,
        RunConfiguration, RunReport,
    };
}
