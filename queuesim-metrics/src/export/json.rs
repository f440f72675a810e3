//! JSON export for batch summaries

use crate::error::MetricsError;
use crate::summary::BatchSummary;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON exporter for [`BatchSummary`]
#[derive(Debug)]
pub struct JsonExporter {
    path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `pretty` - Whether to pretty-print the JSON
    pub fn new(path: &Path, pretty: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            pretty,
        }
    }

    pub fn export(&self, summary: &BatchSummary) -> Result<(), MetricsError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(summary)
        } else {
            serde_json::to_string(summary)
        }?;

        let mut file = File::create(&self.path)
            .map_err(|e| MetricsError::Export(format!("Failed to create {}: {e}", self.path.display())))?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;

        debug!(path = %self.path.display(), "JSON summary written");
        Ok(())
    }
}
