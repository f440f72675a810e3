//! Metrics collection and export for queueing simulations
//!
//! - [`RunMetrics`]: counts and queue-delay samples of one run, gated by a
//!   warm-up window and mirrored to the `metrics` facade.
//! - [`stats`]: means with explicit handling of empty samples.
//! - [`TableRow`] / [`Cell`]: the tabular shape of per-run results, written by
//!   [`export::csv::CsvExporter`].
//! - [`BatchSummary`]: cross-run averages, exportable as JSON.

pub mod error;
pub mod export;
pub mod recorder;
pub mod run_metrics;
pub mod stats;
pub mod summary;
pub mod table;

pub use error::MetricsError;
pub use recorder::{with_capturing_recorder, CapturingRecorder, FacadeSnapshot};
pub use run_metrics::{MetricKey, RunMetrics, Sample};
pub use stats::{mean, mean_of_means, mean_skipping_missing};
pub use summary::{BatchSummary, ColumnSummary};
pub use table::{Cell, TableRow};
