//! CoordinatorHandle - client interface for integrations and entities

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::debug;

use super::error::{CoordinatorError, FailureInfo, FailureKind};
use super::messages::{CoordRequest, CoordinatorMetrics, RefreshOutcome};
use super::state::CoordinatorState;
use crate::events::{CoordinatorEvent, EventBus};
use crate::observer::{Observer, ObserverId};

/// Read-only view of a coordinator's published state
///
/// Holds no request sender, so it never keeps the coordinator task alive.
/// This is what observers should capture.
pub struct CoordinatorReader<T> {
    name: Arc<str>,
    state_rx: watch::Receiver<CoordinatorState<T>>,
}

impl<T> Clone for CoordinatorReader<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state_rx: self.state_rx.clone(),
        }
    }
}

impl<T> CoordinatorReader<T> {
    /// Name of the coordinator
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current cached snapshot; never triggers a fetch
    pub fn get_data(&self) -> Option<Arc<T>> {
        self.state_rx.borrow().data.clone()
    }

    /// Whether the most recent refresh succeeded
    pub fn last_update_success(&self) -> bool {
        self.state_rx.borrow().last_update_success
    }

    /// Detail of the most recent failure, if the last refresh failed
    pub fn last_exception(&self) -> Option<FailureInfo> {
        self.state_rx.borrow().last_exception.clone()
    }

    /// When data was last committed successfully
    pub fn last_update_success_time(&self) -> Option<DateTime<Utc>> {
        self.state_rx.borrow().last_update_success_time
    }

    /// Current nominal update interval
    pub fn update_interval(&self) -> Duration {
        self.state_rx.borrow().update_interval
    }

    /// Copy of the whole published state
    pub fn state(&self) -> CoordinatorState<T> {
        self.state_rx.borrow().clone()
    }

    /// Receiver that wakes on every published state change
    pub fn watch(&self) -> watch::Receiver<CoordinatorState<T>> {
        self.state_rx.clone()
    }
}

/// Handle for talking to a running Coordinator
///
/// Cloneable. Reads (`get_data`, `last_update_success`, `state`) are served
/// from the last published state without a round trip to the coordinator
/// task, and keep working after the coordinator has shut down.
///
/// The coordinator task ends once every handle is dropped. Anything stored
/// inside the coordinator (observers) should hold a [`CoordinatorReader`] or
/// a [`WeakCoordinatorHandle`] instead.
pub struct CoordinatorHandle<T> {
    tx: mpsc::Sender<CoordRequest<T>>,
    reader: CoordinatorReader<T>,
    events: EventBus,
}

impl<T> Clone for CoordinatorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            reader: self.reader.clone(),
            events: self.events.clone(),
        }
    }
}

/// Handle that does not keep the coordinator task alive
pub struct WeakCoordinatorHandle<T> {
    tx: mpsc::WeakSender<CoordRequest<T>>,
    reader: CoordinatorReader<T>,
    events: EventBus,
}

impl<T> Clone for WeakCoordinatorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            reader: self.reader.clone(),
            events: self.events.clone(),
        }
    }
}

impl<T> WeakCoordinatorHandle<T> {
    /// Full handle, or `None` if every strong handle is gone
    pub fn upgrade(&self) -> Option<CoordinatorHandle<T>> {
        self.tx.upgrade().map(|tx| CoordinatorHandle {
            tx,
            reader: self.reader.clone(),
            events: self.events.clone(),
        })
    }

    pub fn reader(&self) -> &CoordinatorReader<T> {
        &self.reader
    }
}

impl<T> CoordinatorHandle<T> {
    pub(crate) fn new(
        name: Arc<str>,
        tx: mpsc::Sender<CoordRequest<T>>,
        state_rx: watch::Receiver<CoordinatorState<T>>,
        events: EventBus,
    ) -> Self {
        debug!(%name, "CoordinatorHandle::new: called");
        Self {
            tx,
            reader: CoordinatorReader { name, state_rx },
            events,
        }
    }

    /// Read-only view sharing this handle's state receiver
    pub fn reader(&self) -> CoordinatorReader<T> {
        self.reader.clone()
    }

    /// Handle that does not keep the coordinator alive
    pub fn downgrade(&self) -> WeakCoordinatorHandle<T> {
        WeakCoordinatorHandle {
            tx: self.tx.downgrade(),
            reader: self.reader.clone(),
            events: self.events.clone(),
        }
    }

    /// Name of the coordinator
    pub fn name(&self) -> &str {
        self.reader.name()
    }

    /// Current cached snapshot; never triggers a fetch
    pub fn get_data(&self) -> Option<Arc<T>> {
        self.reader.get_data()
    }

    /// Whether the most recent refresh succeeded
    pub fn last_update_success(&self) -> bool {
        self.reader.last_update_success()
    }

    pub fn last_exception(&self) -> Option<FailureInfo> {
        self.reader.last_exception()
    }

    pub fn last_update_success_time(&self) -> Option<DateTime<Utc>> {
        self.reader.last_update_success_time()
    }

    pub fn update_interval(&self) -> Duration {
        self.reader.update_interval()
    }

    /// Copy of the whole published state
    pub fn state(&self) -> CoordinatorState<T> {
        self.reader.state()
    }

    /// Receiver that wakes on every published state change
    pub fn watch(&self) -> watch::Receiver<CoordinatorState<T>> {
        self.reader.watch()
    }

    /// Subscribe to the coordinator's event stream
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Refresh now, or join the refresh already in flight
    ///
    /// Returns once the (possibly shared) refresh has committed. A failed
    /// fetch is reported as `RefreshOutcome::Failed`, not as an error.
    pub async fn request_refresh(&self) -> Result<RefreshOutcome, CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::request_refresh: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::Refresh { reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Initial refresh at setup
    ///
    /// Fails with `NotReady` (or `AuthFailed`) if the refresh failed, so the
    /// caller can retry setup later instead of starting with no data.
    pub async fn first_refresh(&self) -> Result<(), CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::first_refresh: called");
        match self.request_refresh().await? {
            RefreshOutcome::Success { .. } => Ok(()),
            RefreshOutcome::Failed { failure, .. } if failure.kind == FailureKind::AuthFailed => {
                Err(CoordinatorError::AuthFailed(failure))
            }
            RefreshOutcome::Failed { failure, .. } => Err(CoordinatorError::NotReady(failure)),
        }
    }

    /// Commit externally pushed data and notify observers
    ///
    /// Returns the commit sequence number.
    pub async fn set_updated_data(&self, data: T) -> Result<u64, CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::set_updated_data: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::SetData { data, reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Record an externally detected failure and notify observers
    ///
    /// Keeps the cached data. Returns the commit sequence number.
    pub async fn set_update_error(&self, failure: FailureInfo) -> Result<u64, CoordinatorError> {
        debug!(name = %self.reader.name, kind = ?failure.kind, "CoordinatorHandle::set_update_error: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::SetError { failure, reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Notify every observer without fetching or committing anything
    pub async fn update_listeners(&self) -> Result<(), CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::update_listeners: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::UpdateListeners { reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Change the polling period; applies from the next scheduled tick
    pub async fn set_update_interval(&self, interval: Duration) -> Result<(), CoordinatorError> {
        debug!(name = %self.reader.name, ?interval, "CoordinatorHandle::set_update_interval: called");
        self.send(CoordRequest::SetInterval { interval }).await
    }

    /// Register an observer; idempotent per observer
    pub async fn add_observer(&self, observer: Arc<dyn Observer>) -> Result<ObserverId, CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::add_observer: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::AddObserver { observer, reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Deregister an observer; returns false if it was not registered
    pub async fn remove_observer(&self, id: ObserverId) -> Result<bool, CoordinatorError> {
        debug!(name = %self.reader.name, %id, "CoordinatorHandle::remove_observer: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::RemoveObserver { id, reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Arm the periodic scheduler
    pub async fn start(&self) -> Result<(), CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::start: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::Start { reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Cancel all future ticks
    ///
    /// A refresh already in flight still completes and commits. Reads keep
    /// working; further manual refreshes are rejected.
    pub async fn stop(&self) -> Result<(), CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::stop: called");
        self.send(CoordRequest::Stop).await
    }

    /// Stop, wait for the in-flight refresh, release observers and end the task
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::Shutdown { reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Get current coordinator metrics
    pub async fn metrics(&self) -> Result<CoordinatorMetrics, CoordinatorError> {
        debug!(name = %self.reader.name, "CoordinatorHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::GetMetrics { reply_tx }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    async fn send(&self, request: CoordRequest<T>) -> Result<(), CoordinatorError> {
        self.tx.send(request).await.map_err(|_| CoordinatorError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_handle() -> (CoordinatorHandle<u32>, mpsc::Receiver<CoordRequest<u32>>) {
        let (tx, rx) = mpsc::channel(4);
        let (_state_tx, state_rx) = watch::channel(CoordinatorState::new(Duration::from_secs(30)));
        let handle = CoordinatorHandle::new(Arc::from("detached"), tx, state_rx, EventBus::new(4));
        (handle, rx)
    }

    #[tokio::test]
    async fn test_reads_do_not_need_the_task() {
        let (handle, rx) = detached_handle();
        drop(rx);

        assert_eq!(handle.name(), "detached");
        assert!(handle.get_data().is_none());
        assert!(handle.last_update_success());
        assert_eq!(handle.update_interval(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_reader_does_not_hold_the_channel_open() {
        let (handle, mut rx) = detached_handle();
        let reader = handle.reader();
        drop(handle);

        assert!(rx.recv().await.is_none());
        assert_eq!(reader.name(), "detached");
        assert!(reader.last_update_success());
    }

    #[tokio::test]
    async fn test_weak_handle_upgrades_only_while_a_handle_lives() {
        let (handle, mut rx) = detached_handle();
        let weak = handle.downgrade();

        let upgraded = weak.upgrade().expect("strong handle still alive");
        assert_eq!(upgraded.name(), "detached");
        drop(upgraded);
        drop(handle);

        assert!(weak.upgrade().is_none());
        assert!(rx.recv().await.is_none());
        assert_eq!(weak.reader().update_interval(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_requests_fail_when_task_is_gone() {
        let (handle, rx) = detached_handle();
        drop(rx);

        assert!(matches!(handle.request_refresh().await, Err(CoordinatorError::ChannelClosed)));
        assert!(matches!(handle.stop().await, Err(CoordinatorError::ChannelClosed)));
        assert!(matches!(handle.metrics().await, Err(CoordinatorError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_dropped_reply_maps_to_channel_closed() {
        let (handle, mut rx) = detached_handle();

        let task = tokio::spawn(async move {
            // Receive the request and drop it without replying
            let _ = rx.recv().await;
        });

        assert!(matches!(handle.request_refresh().await, Err(CoordinatorError::ChannelClosed)));
        task.await.unwrap();
    }
}
