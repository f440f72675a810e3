//! Error types for metrics and export

use thiserror::Error;

/// Errors related to metrics collection and export
#[derive(Debug, Error)]
pub enum MetricsError {
    /// No sample was recorded after the warm-up window, so the statistic is
    /// undefined.
    #[error("No samples recorded after warm-up for {statistic}")]
    EmptySample { statistic: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export error: {0}")]
    Export(String),
}

impl MetricsError {
    pub fn empty_sample(statistic: impl Into<String>) -> Self {
        MetricsError::EmptySample {
            statistic: statistic.into(),
        }
    }
}
