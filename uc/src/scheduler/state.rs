//! Scheduler lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle of the periodic refresh timer
///
/// `Idle -> Scheduled -> Running -> Scheduled (loop) -> Cancelled`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerState {
    /// Created, not yet started
    #[default]
    Idle,

    /// Armed, waiting for the next tick
    Scheduled,

    /// A tick fired and its refresh has not completed yet
    Running,

    /// Stopped for good
    Cancelled,
}

impl SchedulerState {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SchedulerState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Scheduled => "scheduled",
            SchedulerState::Running => "running",
            SchedulerState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
