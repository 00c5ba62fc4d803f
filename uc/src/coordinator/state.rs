//! Published coordinator state

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::error::FailureInfo;
use crate::scheduler::SchedulerState;

/// Snapshot of a coordinator's state as seen by observers
///
/// Published as a whole after every commit, so a reader always sees the
/// result of exactly one completed refresh.
#[derive(Debug)]
pub struct CoordinatorState<T> {
    /// Last successfully fetched payload; never cleared by a failure
    pub data: Option<Arc<T>>,

    /// Whether the most recent refresh succeeded
    pub last_update_success: bool,

    /// Detail of the most recent failure, cleared on success
    pub last_exception: Option<FailureInfo>,

    /// When data was last committed successfully
    pub last_update_success_time: Option<DateTime<Utc>>,

    /// Nominal period between automatic refreshes
    pub update_interval: Duration,

    /// True while a refresh operation is executing
    pub refresh_in_flight: bool,

    pub scheduler: SchedulerState,

    /// Bumped on every commit (refresh or push)
    pub sequence: u64,
}

impl<T> CoordinatorState<T> {
    pub(crate) fn new(update_interval: Duration) -> Self {
        Self {
            data: None,
            // Optimistic until the first refresh says otherwise
            last_update_success: true,
            last_exception: None,
            last_update_success_time: None,
            update_interval,
            refresh_in_flight: false,
            scheduler: SchedulerState::Idle,
            sequence: 0,
        }
    }

    /// Whether dependents should present themselves as available
    pub fn is_available(&self) -> bool {
        self.last_update_success
    }
}

// Manual impl: cloning only bumps the Arc, T itself need not be Clone
impl<T> Clone for CoordinatorState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            last_update_success: self.last_update_success,
            last_exception: self.last_exception.clone(),
            last_update_success_time: self.last_update_success_time,
            update_interval: self.update_interval,
            refresh_in_flight: self.refresh_in_flight,
            scheduler: self.scheduler,
            sequence: self.sequence,
        }
    }
}
