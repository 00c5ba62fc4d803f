//! Main Coordinator task implementation

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::CoordinatorConfig;
use super::error::{CoordinatorError, FailureInfo, FailureKind};
use super::handle::CoordinatorHandle;
use super::messages::{CoordRequest, CoordinatorMetrics, RefreshOutcome};
use super::refresh::{Fetch, RefreshResult, refresh_operation};
use super::state::CoordinatorState;
use crate::events::{CoordinatorEvent, EventBus};
use crate::observer::ObserverRegistry;
use crate::scheduler::{Scheduler, sleep_until_deadline};

/// A refresh operation that has been started but not committed
struct InFlight<T> {
    future: BoxFuture<'static, RefreshResult<T>>,
    waiters: Vec<oneshot::Sender<Result<RefreshOutcome, CoordinatorError>>>,
    started: Instant,
}

/// The Coordinator multiplexes one polling source to many observers
///
/// All state lives inside the task started by [`Coordinator::run`]; the
/// outside world talks to it through [`CoordinatorHandle`]s.
pub struct Coordinator<T> {
    config: CoordinatorConfig,
    fetcher: Arc<dyn Fetch<T>>,
    tx: mpsc::Sender<CoordRequest<T>>,
    rx: mpsc::Receiver<CoordRequest<T>>,
    state_tx: watch::Sender<CoordinatorState<T>>,
    events: EventBus,
    name: Arc<str>,
}

impl<T> Coordinator<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Create a new Coordinator polling `fetcher`
    pub fn new(config: CoordinatorConfig, fetcher: impl Fetch<T> + 'static) -> Self {
        debug!(name = %config.name, "Coordinator::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        let (state_tx, _) = watch::channel(CoordinatorState::new(config.update_interval()));
        let events = EventBus::new(config.event_capacity);
        let name: Arc<str> = Arc::from(config.name.as_str());
        Self {
            config,
            fetcher: Arc::new(fetcher),
            tx,
            rx,
            state_tx,
            events,
            name,
        }
    }

    /// Create a coordinator and spawn its task on the current runtime
    pub fn spawn(
        config: CoordinatorConfig,
        fetcher: impl Fetch<T> + 'static,
    ) -> (CoordinatorHandle<T>, tokio::task::JoinHandle<()>) {
        let coordinator = Self::new(config, fetcher);
        let handle = coordinator.handle();
        let task = tokio::spawn(coordinator.run());
        (handle, task)
    }

    /// Create a handle to this coordinator
    pub fn handle(&self) -> CoordinatorHandle<T> {
        CoordinatorHandle::new(
            self.name.clone(),
            self.tx.clone(),
            self.state_tx.subscribe(),
            self.events.clone(),
        )
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested or
    /// every handle has been dropped. A refresh in flight at that point is
    /// allowed to finish and commit before the task ends.
    pub async fn run(self) {
        let Coordinator {
            config,
            fetcher,
            tx,
            mut rx,
            state_tx,
            events,
            name,
        } = self;
        // Only handles keep the request channel open
        drop(tx);

        let scheduler = Scheduler::new(config.update_interval());
        let mut runtime = Runtime {
            state: CoordinatorState::new(scheduler.interval()),
            scheduler,
            registry: ObserverRegistry::new(),
            in_flight: None,
            metrics: CoordinatorMetrics::default(),
            shutdown_waiters: Vec::new(),
            closing: false,
            config,
            fetcher,
            state_tx,
            events,
            name,
        };

        info!(name = %runtime.name, "Coordinator started");

        loop {
            if runtime.closing && runtime.in_flight.is_none() {
                break;
            }

            let deadline = runtime.scheduler.deadline();

            tokio::select! {
                result = next_result(&mut runtime.in_flight) => {
                    runtime.complete_refresh(result);
                }

                req = rx.recv(), if !runtime.closing => {
                    match req {
                        Some(req) => runtime.handle_request(req),
                        None => {
                            debug!(name = %runtime.name, "Coordinator::run: all handles dropped");
                            runtime.begin_shutdown();
                        }
                    }
                }

                _ = sleep_until_deadline(deadline) => {
                    runtime.on_tick();
                }
            }
        }

        runtime.finish();
    }
}

/// Await the in-flight operation, or pend forever when there is none
async fn next_result<T>(in_flight: &mut Option<InFlight<T>>) -> RefreshResult<T> {
    match in_flight {
        Some(op) => (&mut op.future).await,
        None => std::future::pending().await,
    }
}

/// What a commit writes into the published state
enum Commit<T> {
    Data(T),
    Failure(FailureInfo),
}

/// State owned by the coordinator task
struct Runtime<T> {
    config: CoordinatorConfig,
    fetcher: Arc<dyn Fetch<T>>,
    state_tx: watch::Sender<CoordinatorState<T>>,
    events: EventBus,
    name: Arc<str>,
    scheduler: Scheduler,
    state: CoordinatorState<T>,
    registry: ObserverRegistry,
    in_flight: Option<InFlight<T>>,
    metrics: CoordinatorMetrics,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
    closing: bool,
}

impl<T> Runtime<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn handle_request(&mut self, req: CoordRequest<T>) {
        match req {
            CoordRequest::Refresh { reply_tx } => {
                if self.scheduler.state().is_cancelled() {
                    debug!(name = %self.name, "Refresh rejected, coordinator stopped");
                    let _ = reply_tx.send(Err(CoordinatorError::Cancelled(self.name.to_string())));
                    return;
                }
                self.refresh(Some(reply_tx));
            }

            CoordRequest::SetData { data, reply_tx } => {
                let sequence = self.set_updated_data(data);
                let _ = reply_tx.send(sequence);
            }

            CoordRequest::SetError { failure, reply_tx } => {
                let sequence = self.set_update_error(failure);
                let _ = reply_tx.send(sequence);
            }

            CoordRequest::UpdateListeners { reply_tx } => {
                self.update_listeners();
                let _ = reply_tx.send(());
            }

            CoordRequest::SetInterval { interval } => {
                debug!(name = %self.name, ?interval, "Updating interval");
                self.scheduler.set_interval(interval);
                self.state.update_interval = self.scheduler.interval();
                self.publish();
            }

            CoordRequest::AddObserver { observer, reply_tx } => {
                let id = self.registry.add(observer);
                self.metrics.observers = self.registry.len();
                let _ = reply_tx.send(id);
            }

            CoordRequest::RemoveObserver { id, reply_tx } => {
                let removed = self.registry.remove(id);
                self.metrics.observers = self.registry.len();
                let _ = reply_tx.send(removed);
            }

            CoordRequest::Start { reply_tx } => {
                let result = if self.scheduler.start(Instant::now()) {
                    info!(
                        name = %self.name,
                        interval = ?self.scheduler.interval(),
                        "Scheduler started"
                    );
                    Ok(())
                } else {
                    warn!(name = %self.name, "Cannot start a stopped coordinator");
                    Err(CoordinatorError::Cancelled(self.name.to_string()))
                };
                self.state.scheduler = self.scheduler.state();
                self.publish();
                let _ = reply_tx.send(result);
            }

            CoordRequest::Stop => {
                self.stop();
            }

            CoordRequest::GetMetrics { reply_tx } => {
                self.metrics.ticks = self.scheduler.ticks();
                let _ = reply_tx.send(self.metrics.clone());
            }

            CoordRequest::Shutdown { reply_tx } => {
                self.shutdown_waiters.push(reply_tx);
                self.begin_shutdown();
            }
        }
    }

    /// Start a refresh, or attach to the one in flight
    fn refresh(&mut self, waiter: Option<oneshot::Sender<Result<RefreshOutcome, CoordinatorError>>>) {
        if let Some(op) = self.in_flight.as_mut() {
            debug!(name = %self.name, "Refresh already in flight, joining it");
            self.metrics.deduplicated_requests += 1;
            op.waiters.extend(waiter);
            return;
        }

        debug!(name = %self.name, "Starting refresh");
        self.metrics.refreshes_started += 1;
        self.in_flight = Some(InFlight {
            future: refresh_operation(self.fetcher.clone(), self.config.fetch_timeout()),
            waiters: waiter.into_iter().collect(),
            started: Instant::now(),
        });
        self.state.refresh_in_flight = true;
        self.publish();
    }

    fn on_tick(&mut self) {
        if self.scheduler.on_tick() {
            debug!(name = %self.name, tick = self.scheduler.ticks(), "Scheduled refresh");
            self.state.scheduler = self.scheduler.state();
            self.refresh(None);
        }
    }

    /// Commit the result of the in-flight operation and fan out
    fn complete_refresh(&mut self, result: RefreshResult<T>) {
        let Some(op) = self.in_flight.take() else {
            return;
        };
        let elapsed = op.started.elapsed();
        self.state.refresh_in_flight = false;

        let commit = match result {
            Ok(data) => {
                self.metrics.refreshes_succeeded += 1;
                Commit::Data(data)
            }
            Err(failure) => {
                self.metrics.refreshes_failed += 1;
                Commit::Failure(failure)
            }
        };
        let (outcome, changed) = self.apply(commit);

        debug!(
            name = %self.name,
            elapsed_secs = elapsed.as_secs_f64(),
            success = outcome.is_success(),
            "Finished fetching data"
        );

        self.scheduler.on_refresh_complete(Instant::now());
        self.state.scheduler = self.scheduler.state();
        self.publish();

        for waiter in op.waiters {
            let _ = waiter.send(Ok(outcome.clone()));
        }
        self.announce(&outcome, changed);
    }

    /// Write a commit into the state; returns the outcome and whether observers see a change
    fn apply(&mut self, commit: Commit<T>) -> (RefreshOutcome, bool) {
        let previous_success = self.state.last_update_success;
        let previous_data = self.state.data.clone();

        self.state.sequence += 1;
        let sequence = self.state.sequence;

        let outcome = match commit {
            Commit::Data(data) => {
                let after_failures = self.metrics.consecutive_failures;
                if !previous_success {
                    info!(name = %self.name, after_failures, "Fetching data recovered");
                    self.events.emit(CoordinatorEvent::Recovered {
                        name: self.name.to_string(),
                        sequence,
                        after_failures,
                    });
                }
                self.state.data = Some(Arc::new(data));
                self.state.last_update_success = true;
                self.state.last_exception = None;
                self.state.last_update_success_time = Some(Utc::now());
                self.metrics.consecutive_failures = 0;
                RefreshOutcome::Success { sequence }
            }
            Commit::Failure(failure) => {
                self.metrics.consecutive_failures += 1;
                self.log_failure(&failure);
                if failure.kind == FailureKind::AuthFailed {
                    error!(name = %self.name, "Authentication failed, stopping scheduled refreshes");
                    self.scheduler.stop();
                    self.state.scheduler = self.scheduler.state();
                }
                self.state.last_update_success = false;
                self.state.last_exception = Some(failure.clone());
                RefreshOutcome::Failed { sequence, failure }
            }
        };

        let changed = previous_success != self.state.last_update_success
            || !same_data(previous_data.as_ref(), self.state.data.as_ref());
        (outcome, changed)
    }

    /// Emit the event for a published commit and notify observers if warranted
    fn announce(&mut self, outcome: &RefreshOutcome, changed: bool) {
        match outcome {
            RefreshOutcome::Success { sequence } => self.events.emit(CoordinatorEvent::Updated {
                name: self.name.to_string(),
                sequence: *sequence,
            }),
            RefreshOutcome::Failed { sequence, failure } => self.events.emit(CoordinatorEvent::Failed {
                name: self.name.to_string(),
                sequence: *sequence,
                failure: failure.clone(),
                consecutive_failures: self.metrics.consecutive_failures,
            }),
        }

        if self.config.always_update || changed {
            self.notify_observers();
        } else {
            debug!(name = %self.name, "Nothing changed, skipping observer notification");
            self.metrics.notifications_suppressed += 1;
        }
    }

    /// First failure of a streak is loud, repeats are quiet
    fn log_failure(&self, failure: &FailureInfo) {
        let first = self.metrics.consecutive_failures == 1;
        let consecutive = self.metrics.consecutive_failures;
        match (failure.kind, first) {
            (FailureKind::UpdateFailed | FailureKind::Timeout, true) => {
                warn!(name = %self.name, kind = %failure.kind, error = %failure.message, "Error fetching data");
            }
            (FailureKind::AuthFailed, true) => {
                error!(name = %self.name, error = %failure.message, "Authentication failed while fetching data");
            }
            (FailureKind::Unexpected, true) => {
                error!(
                    name = %self.name,
                    error = %failure.message,
                    detail = failure.detail.as_deref().unwrap_or(""),
                    "Unexpected error fetching data"
                );
            }
            (_, false) => {
                debug!(
                    name = %self.name,
                    kind = %failure.kind,
                    error = %failure.message,
                    detail = failure.detail.as_deref().unwrap_or(""),
                    consecutive,
                    "Error fetching data (repeated)"
                );
            }
        }
    }

    /// Commit pushed data as a successful update
    ///
    /// Pushed data always notifies, whatever `always_update` says.
    fn set_updated_data(&mut self, data: T) -> u64 {
        debug!(name = %self.name, "Committing pushed data");
        self.metrics.push_updates += 1;
        let (outcome, _) = self.apply(Commit::Data(data));

        self.scheduler.reschedule(Instant::now());
        self.state.scheduler = self.scheduler.state();
        self.publish();

        self.announce(&outcome, true);
        outcome.sequence()
    }

    /// Commit an externally detected failure; cached data is kept
    fn set_update_error(&mut self, failure: FailureInfo) -> u64 {
        debug!(name = %self.name, kind = %failure.kind, "Committing pushed failure");
        self.metrics.pushed_failures += 1;
        let (outcome, changed) = self.apply(Commit::Failure(failure));
        self.publish();

        self.announce(&outcome, changed);
        outcome.sequence()
    }

    /// Notify observers about state they already can read
    fn update_listeners(&mut self) {
        debug!(name = %self.name, observers = self.registry.len(), "Updating listeners");
        self.metrics.listener_updates += 1;
        self.notify_observers();
    }

    fn notify_observers(&mut self) {
        let report = self.registry.notify_all(&self.name);
        self.metrics.notifications_sent += report.notified as u64;
        self.metrics.observer_failures += report.failed as u64;
    }

    fn stop(&mut self) {
        if !self.scheduler.state().is_cancelled() {
            info!(name = %self.name, "Stopping scheduled refreshes");
        }
        self.scheduler.stop();
        self.state.scheduler = self.scheduler.state();
        self.publish();
    }

    fn begin_shutdown(&mut self) {
        debug!(name = %self.name, in_flight = self.in_flight.is_some(), "Coordinator shutting down");
        self.stop();
        self.closing = true;
    }

    /// Release observers and acknowledge shutdown requests
    fn finish(mut self) {
        self.registry.clear();
        self.metrics.observers = 0;
        self.events.emit(CoordinatorEvent::Stopped {
            name: self.name.to_string(),
        });
        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
        info!(name = %self.name, "Coordinator stopped");
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

fn same_data<T: PartialEq>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b) || **a == **b,
        _ => false,
    }
}
