//! Averages across the runs of a batch.

use serde::Serialize;
use std::fmt;

use crate::stats::mean_skipping_missing;
use crate::table::{Cell, TableRow};

/// Cross-run average of one result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    /// Mean over the runs where the value is defined.
    pub mean: Option<f64>,
    /// Number of runs that contributed to `mean`.
    pub samples: usize,
}

/// Cross-run averages of every numeric column of a results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub runs: usize,
    pub columns: Vec<ColumnSummary>,
}

impl BatchSummary {
    /// Average every numeric column of `rows`.
    ///
    /// Index columns are left out. Missing cells are skipped, so a column is
    /// only undefined when no run defines it.
    pub fn from_rows<R: TableRow>(rows: &[R]) -> Self {
        let names = R::columns();
        let table: Vec<_> = rows.iter().map(|row| row.cells()).collect();

        let columns = names
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                !table
                    .iter()
                    .any(|cells| matches!(cells.get(*i), Some(Cell::Index(_))))
            })
            .map(|(i, name)| {
                let values: Vec<Option<f64>> = table
                    .iter()
                    .map(|cells| cells.get(i).and_then(|cell| cell.as_f64()))
                    .collect();
                ColumnSummary {
                    name: (*name).to_string(),
                    mean: mean_skipping_missing(&values),
                    samples: values.iter().flatten().count(),
                }
            })
            .collect();

        Self {
            runs: rows.len(),
            columns,
        }
    }

    /// Average of the column called `name`, if it exists and is defined.
    pub fn mean(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .and_then(|column| column.mean)
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Averages over {} runs", self.runs)?;
        for column in &self.columns {
            match column.mean {
                Some(mean) => writeln!(f, "Average {}: {mean}", column.name)?,
                None => writeln!(f, "Average {}: undefined", column.name)?,
            }
        }
        Ok(())
    }
}
