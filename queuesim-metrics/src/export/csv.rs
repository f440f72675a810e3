//! CSV export for per-run result rows

use crate::error::MetricsError;
use crate::table::TableRow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// CSV exporter writing one header line and one line per row.
///
/// Undefined statistics become empty fields.
#[derive(Debug)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export<R: TableRow>(&self, rows: &[R]) -> Result<(), MetricsError> {
        let file = File::create(&self.path)
            .map_err(|e| MetricsError::Export(format!("Failed to create {}: {e}", self.path.display())))?;
        let mut writer = BufWriter::new(file);
        write_table(&mut writer, rows)?;
        writer.flush()?;
        debug!(path = %self.path.display(), rows = rows.len(), "CSV results written");
        Ok(())
    }
}

/// Write the header and `rows` to `writer`.
pub fn write_table<W: Write, R: TableRow>(writer: &mut W, rows: &[R]) -> Result<(), MetricsError> {
    let columns = R::columns();
    let header: Vec<String> = columns.iter().map(|c| escape_csv(c)).collect();
    writeln!(writer, "{}", header.join(","))?;

    for (index, row) in rows.iter().enumerate() {
        let cells = row.cells();
        if cells.len() != columns.len() {
            return Err(MetricsError::Export(format!(
                "row {index} has {} cells but the table has {} columns",
                cells.len(),
                columns.len()
            )));
        }
        let fields: Vec<String> = cells.iter().map(|cell| escape_csv(&cell.to_string())).collect();
        writeln!(writer, "{}", fields.join(","))?;
    }
    Ok(())
}

/// Escape CSV field (add quotes if needed)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
