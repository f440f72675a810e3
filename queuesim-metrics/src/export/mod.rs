//! Export of run results
//!
//! Per-run rows go to CSV, readable by spreadsheets and pandas; the
//! cross-run summary goes to JSON.

pub mod csv;
pub mod json;

use crate::error::MetricsError;
use crate::summary::BatchSummary;
use crate::table::TableRow;
use std::path::Path;

/// Write `rows` as a CSV table with a header line.
///
/// # Example
/// ```no_run
/// use queuesim_metrics::export::export_csv;
/// use queuesim_metrics::{Cell, TableRow};
///
/// struct Row(usize, f64);
///
/// impl TableRow for Row {
///     fn columns() -> Vec<&'static str> {
///         vec!["Run", "Mean Delay"]
///     }
///     fn cells(&self) -> Vec<Cell> {
///         vec![Cell::Index(self.0), Cell::Float(self.1)]
///     }
/// }
///
/// export_csv(&[Row(0, 1.5), Row(1, 2.5)], "results.csv").unwrap();
/// ```
pub fn export_csv<R: TableRow>(rows: &[R], path: impl AsRef<Path>) -> Result<(), MetricsError> {
    csv::CsvExporter::new(path.as_ref()).export(rows)
}

/// Write a batch summary as JSON.
pub fn export_json(summary: &BatchSummary, path: impl AsRef<Path>, pretty: bool) -> Result<(), MetricsError> {
    json::JsonExporter::new(path.as_ref(), pretty).export(summary)
}
