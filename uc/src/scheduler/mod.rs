//! Scheduler for periodic refreshes
//!
//! Drives the coordinator's polling cadence. Runtime interval changes apply
//! from the next arming; stopping is terminal. Periods shorter than
//! [`MIN_INTERVAL`] are clamped so a zero interval cannot spin the task.

mod core;
mod state;

pub use self::core::{MIN_INTERVAL, Scheduler, sleep_until_deadline};
pub use state::SchedulerState;
