//! Core type definitions and newtypes for the simulation kernel

use serde::{Deserialize, Serialize};
use std::fmt;

/// Insertion sequence number of a scheduled event.
///
/// Event ids grow monotonically within one scheduler and break ties between
/// events that fire at the same simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.0)
    }
}

/// Identifier of a logical process hosted by a [`crate::async_runtime::DesRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process({})", self.0)
    }
}
