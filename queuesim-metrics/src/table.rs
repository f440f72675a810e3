//! Tabular view of per-run results.

use serde::Serialize;
use std::fmt;

/// One value of a result row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Cell {
    /// Row identifier; not averaged across rows.
    Index(usize),
    Integer(u64),
    Float(f64),
    /// An undefined statistic, written as an empty field.
    Missing,
}

impl Cell {
    pub fn from_option(value: Option<f64>) -> Self {
        value.map_or(Cell::Missing, Cell::Float)
    }

    /// Numeric value taking part in cross-row averages.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Cell::Integer(value) => Some(value as f64),
            Cell::Float(value) => Some(value),
            Cell::Index(_) | Cell::Missing => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Index(value) => write!(f, "{value}"),
            Cell::Integer(value) => write!(f, "{value}"),
            // Debug keeps a trailing `.0` on whole numbers, so floats stay floats
            // for readers that infer column types.
            Cell::Float(value) => write!(f, "{value:?}"),
            Cell::Missing => Ok(()),
        }
    }
}

/// A record that can be written as one row of a results table.
pub trait TableRow {
    /// Column headers, in the order of [`TableRow::cells`].
    fn columns() -> Vec<&'static str>;

    fn cells(&self) -> Vec<Cell>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Index(3).to_string(), "3");
        assert_eq!(Cell::Integer(445).to_string(), "445");
        assert_eq!(Cell::Float(445.0).to_string(), "445.0");
        assert_eq!(Cell::Float(0.1 + 0.2).to_string(), "0.30000000000000004");
        assert_eq!(Cell::Missing.to_string(), "");
    }

    #[test]
    fn test_cell_numeric_value() {
        assert_eq!(Cell::Index(1).as_f64(), None);
        assert_eq!(Cell::Integer(7).as_f64(), Some(7.0));
        assert_eq!(Cell::from_option(Some(1.5)).as_f64(), Some(1.5));
        assert_eq!(Cell::from_option(None), Cell::Missing);
    }
}
