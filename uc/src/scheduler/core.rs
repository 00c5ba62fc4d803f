//! Scheduler implementation
//!
//! The scheduler is a plain state machine over `tokio::time::Instant`; the
//! coordinator task owns it and sleeps until [`Scheduler::deadline`].

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::state::SchedulerState;

/// Shortest period the scheduler will arm with
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

fn clamp_interval(interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        warn!(?interval, min = ?MIN_INTERVAL, "Update interval too short, clamping");
        MIN_INTERVAL
    } else {
        interval
    }
}

/// Periodic refresh timer
#[derive(Debug)]
pub struct Scheduler {
    state: SchedulerState,
    interval: Duration,
    deadline: Option<Instant>,
    ticks: u64,
}

impl Scheduler {
    /// Create an idle scheduler with the given nominal interval
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn new(interval: Duration) -> Self {
        debug!(?interval, "Scheduler::new: called");
        Self {
            state: SchedulerState::Idle,
            interval: clamp_interval(interval),
            deadline: None,
            ticks: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks that have fired
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// When the next tick fires; only set while `Scheduled`
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Scheduled => self.deadline,
            _ => None,
        }
    }

    /// Arm the timer. Returns false if the scheduler was cancelled.
    pub fn start(&mut self, now: Instant) -> bool {
        debug!(state = %self.state, "Scheduler::start: called");
        match self.state {
            SchedulerState::Idle => {
                self.arm(now);
                true
            }
            SchedulerState::Scheduled | SchedulerState::Running => true,
            SchedulerState::Cancelled => false,
        }
    }

    /// Change the period; the currently armed deadline is left alone
    pub fn set_interval(&mut self, interval: Duration) {
        debug!(?interval, "Scheduler::set_interval: called");
        self.interval = clamp_interval(interval);
    }

    /// Fire a tick. Returns true if the tick should trigger a refresh.
    pub fn on_tick(&mut self) -> bool {
        if self.state != SchedulerState::Scheduled {
            debug!(state = %self.state, "Scheduler::on_tick: not scheduled, ignoring");
            return false;
        }
        self.ticks += 1;
        self.state = SchedulerState::Running;
        self.deadline = None;
        debug!(ticks = self.ticks, "Scheduler::on_tick: running");
        true
    }

    /// A refresh finished; re-arm if a tick was waiting on it
    pub fn on_refresh_complete(&mut self, now: Instant) {
        if self.state == SchedulerState::Running {
            self.arm(now);
        }
    }

    /// Push the next tick a full interval out (used on pushed data)
    pub fn reschedule(&mut self, now: Instant) {
        if self.state == SchedulerState::Scheduled {
            self.arm(now);
        }
    }

    /// Cancel all future ticks; terminal
    pub fn stop(&mut self) {
        debug!(state = %self.state, "Scheduler::stop: called");
        self.state = SchedulerState::Cancelled;
        self.deadline = None;
    }

    fn arm(&mut self, now: Instant) {
        self.state = SchedulerState::Scheduled;
        self.deadline = Some(now + self.interval);
        debug!(interval = ?self.interval, "Scheduler::arm: next tick armed");
    }
}

/// Sleep until the deadline, or forever if there is none
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(10);

    #[test]
    fn test_new_scheduler_is_idle() {
        let scheduler = Scheduler::new(INTERVAL);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.deadline().is_none());
    }

    #[test]
    fn test_start_arms_deadline() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(INTERVAL);

        assert!(scheduler.start(now));
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
        assert_eq!(scheduler.deadline(), Some(now + INTERVAL));
    }

    #[test]
    fn test_tick_cycle() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(INTERVAL);
        scheduler.start(now);

        assert!(scheduler.on_tick());
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(scheduler.deadline().is_none());

        // A second tick while running is ignored
        assert!(!scheduler.on_tick());

        let later = now + INTERVAL;
        scheduler.on_refresh_complete(later);
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
        assert_eq!(scheduler.deadline(), Some(later + INTERVAL));
        assert_eq!(scheduler.ticks(), 1);
    }

    #[test]
    fn test_interval_change_applies_to_next_arming() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(INTERVAL);
        scheduler.start(now);

        scheduler.set_interval(Duration::from_secs(60));
        // Armed deadline is not retroactively changed
        assert_eq!(scheduler.deadline(), Some(now + INTERVAL));

        scheduler.on_tick();
        let later = now + INTERVAL;
        scheduler.on_refresh_complete(later);
        assert_eq!(scheduler.deadline(), Some(later + Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(Duration::ZERO);
        assert_eq!(scheduler.interval(), MIN_INTERVAL);

        scheduler.set_interval(Duration::from_secs(5));
        assert_eq!(scheduler.interval(), Duration::from_secs(5));

        scheduler.set_interval(Duration::from_millis(1));
        scheduler.start(now);
        assert_eq!(scheduler.deadline(), Some(now + MIN_INTERVAL));
    }

    #[test]
    fn test_manual_refresh_does_not_move_phase() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(INTERVAL);
        scheduler.start(now);

        // A refresh completing while merely scheduled leaves the deadline
        scheduler.on_refresh_complete(now + Duration::from_secs(3));
        assert_eq!(scheduler.deadline(), Some(now + INTERVAL));
    }

    #[test]
    fn test_stop_is_terminal() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(INTERVAL);
        scheduler.start(now);
        scheduler.on_tick();
        scheduler.stop();

        assert_eq!(scheduler.state(), SchedulerState::Cancelled);
        scheduler.on_refresh_complete(now);
        assert_eq!(scheduler.state(), SchedulerState::Cancelled);
        assert!(!scheduler.start(now));
        assert!(!scheduler.on_tick());
        assert!(scheduler.deadline().is_none());
    }

    #[test]
    fn test_reschedule_only_when_scheduled() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(INTERVAL);

        scheduler.reschedule(now);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.start(now);
        let pushed = now + Duration::from_secs(4);
        scheduler.reschedule(pushed);
        assert_eq!(scheduler.deadline(), Some(pushed + INTERVAL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_deadline() {
        let start = Instant::now();
        sleep_until_deadline(Some(start + INTERVAL)).await;
        assert!(Instant::now() >= start + INTERVAL);

        let never = tokio::time::timeout(Duration::from_secs(1), sleep_until_deadline(None)).await;
        assert!(never.is_err());
    }
}
