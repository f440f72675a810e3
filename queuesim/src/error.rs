//! Error types for the cafeteria model and batch runner

use std::io;
use std::path::PathBuf;

use queuesim_core::SimError;
use queuesim_metrics::MetricsError;
use thiserror::Error;

/// Anything that can stop a run or a batch.
#[derive(Debug, Error)]
pub enum QueueSimError {
    /// A kernel error raised while validating or running a model.
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
