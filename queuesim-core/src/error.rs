//! Error types for the simulation kernel

use thiserror::Error;

/// Fatal errors raised by the kernel.
///
/// Every variant aborts the run it occurred in. Independent runs own
/// independent kernels, so an error never leaks into another run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A negative, non-finite or overflowing delay was handed to the scheduler.
    #[error("Invalid duration: {value} is not a valid non-negative simulation delay")]
    InvalidDuration { value: f64 },

    /// A distribution or model parameter that cannot produce a valid run.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A runtime-only operation was called while no process was being resumed.
    #[error("{operation} called outside of a simulation process")]
    OutsideRuntime { operation: &'static str },
}

impl SimError {
    /// Shorthand for [`SimError::InvalidParameter`].
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SimError::InvalidParameter(message.into())
    }
}
