//! Event types for coordinator activity streaming

use serde::{Deserialize, Serialize};

use crate::coordinator::FailureInfo;

/// Everything a coordinator publishes on its event stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CoordinatorEvent {
    /// New data was committed (refresh or push)
    Updated { name: String, sequence: u64 },

    /// A refresh failed; previous data is retained
    Failed {
        name: String,
        sequence: u64,
        failure: FailureInfo,
        consecutive_failures: u32,
    },

    /// The first success after one or more failures
    Recovered {
        name: String,
        sequence: u64,
        after_failures: u32,
    },

    /// The coordinator was shut down and released its observers
    Stopped { name: String },
}

impl CoordinatorEvent {
    /// Short event type name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            CoordinatorEvent::Updated { .. } => "Updated",
            CoordinatorEvent::Failed { .. } => "Failed",
            CoordinatorEvent::Recovered { .. } => "Recovered",
            CoordinatorEvent::Stopped { .. } => "Stopped",
        }
    }

    /// Name of the coordinator that emitted the event
    pub fn name(&self) -> &str {
        match self {
            CoordinatorEvent::Updated { name, .. }
            | CoordinatorEvent::Failed { name, .. }
            | CoordinatorEvent::Recovered { name, .. }
            | CoordinatorEvent::Stopped { name } => name,
        }
    }
}
