//! Message types for the Coordinator

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::error::{CoordinatorError, FailureInfo};
use crate::observer::{Observer, ObserverId};

/// Outcome of a refresh, shared by every caller that awaited it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RefreshOutcome {
    Success { sequence: u64 },
    Failed { sequence: u64, failure: FailureInfo },
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Success { .. })
    }

    /// Commit sequence number this outcome was published under
    pub fn sequence(&self) -> u64 {
        match self {
            RefreshOutcome::Success { sequence } | RefreshOutcome::Failed { sequence, .. } => *sequence,
        }
    }

    pub fn failure(&self) -> Option<&FailureInfo> {
        match self {
            RefreshOutcome::Success { .. } => None,
            RefreshOutcome::Failed { failure, .. } => Some(failure),
        }
    }
}

/// Internal requests to the Coordinator task
pub enum CoordRequest<T> {
    /// Refresh now, or join the refresh already in flight
    Refresh {
        reply_tx: oneshot::Sender<Result<RefreshOutcome, CoordinatorError>>,
    },

    /// Commit externally pushed data
    SetData { data: T, reply_tx: oneshot::Sender<u64> },

    /// Record an externally detected failure, keeping the cached data
    SetError {
        failure: FailureInfo,
        reply_tx: oneshot::Sender<u64>,
    },

    /// Notify observers without committing anything
    UpdateListeners { reply_tx: oneshot::Sender<()> },

    /// Change the polling period
    SetInterval { interval: Duration },

    /// Register an observer
    AddObserver {
        observer: Arc<dyn Observer>,
        reply_tx: oneshot::Sender<ObserverId>,
    },

    /// Deregister an observer
    RemoveObserver {
        id: ObserverId,
        reply_tx: oneshot::Sender<bool>,
    },

    /// Arm the periodic scheduler
    Start {
        reply_tx: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Cancel future ticks; the coordinator keeps serving reads
    Stop,

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Stop, let the in-flight refresh finish, release observers and exit
    Shutdown { reply_tx: oneshot::Sender<()> },
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoordinatorMetrics {
    pub refreshes_started: u64,
    pub refreshes_succeeded: u64,
    pub refreshes_failed: u64,
    /// Refresh requests and ticks that joined an operation already in flight
    pub deduplicated_requests: u64,
    pub consecutive_failures: u32,
    pub push_updates: u64,
    /// Failures recorded through `set_update_error`
    pub pushed_failures: u64,
    pub listener_updates: u64,
    pub notifications_sent: u64,
    pub notifications_suppressed: u64,
    pub observer_failures: u64,
    pub observers: usize,
    pub ticks: u64,
}
