//! Coordinator-backed entity
//!
//! The standard observer: an entity that mirrors a coordinator's snapshot
//! and reports itself unavailable while the coordinator's last refresh failed.

use std::sync::{Arc, Mutex};

use eyre::Result;
use tracing::debug;

use super::{Observer, ObserverId};
use crate::coordinator::{CoordinatorError, CoordinatorHandle, CoordinatorReader, WeakCoordinatorHandle};

/// What an entity presents after an update
#[derive(Debug)]
pub struct EntityState<T> {
    pub available: bool,
    /// Last known good snapshot; may be stale while unavailable
    pub data: Option<Arc<T>>,
    pub sequence: u64,
}

type Writer<T> = Box<dyn Fn(&str, &EntityState<T>) -> Result<()> + Send + Sync>;

/// An entity whose state is driven by a coordinator
///
/// Once attached, the coordinator holds the entity, so the entity keeps only
/// a reader and a weak handle. Dropping every outside handle still ends the
/// coordinator task.
pub struct CoordinatorEntity<T> {
    entity_id: String,
    reader: CoordinatorReader<T>,
    coordinator: WeakCoordinatorHandle<T>,
    writer: Writer<T>,
    observer_id: Mutex<Option<ObserverId>>,
}

impl<T> CoordinatorEntity<T>
where
    T: Send + Sync + 'static,
{
    /// Create an entity; `writer` receives the entity's state after each update
    pub fn new(
        entity_id: impl Into<String>,
        coordinator: &CoordinatorHandle<T>,
        writer: impl Fn(&str, &EntityState<T>) -> Result<()> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            entity_id: entity_id.into(),
            reader: coordinator.reader(),
            coordinator: coordinator.downgrade(),
            writer: Box::new(writer),
            observer_id: Mutex::new(None),
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Available iff the coordinator's last refresh succeeded
    pub fn available(&self) -> bool {
        self.reader.last_update_success()
    }

    /// Current snapshot as published by the coordinator
    pub fn state(&self) -> EntityState<T> {
        let state = self.reader.state();
        EntityState {
            available: state.last_update_success,
            data: state.data,
            sequence: state.sequence,
        }
    }

    /// Start listening to the coordinator and write the current state once
    pub async fn attach(self: &Arc<Self>) -> Result<ObserverId, CoordinatorError> {
        debug!(entity_id = %self.entity_id, "CoordinatorEntity::attach: called");
        let coordinator = self.coordinator.upgrade().ok_or(CoordinatorError::ChannelClosed)?;
        let observer: Arc<dyn Observer> = self.clone();
        let id = coordinator.add_observer(observer).await?;
        *self.observer_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);

        if let Err(e) = self.on_update() {
            debug!(entity_id = %self.entity_id, error = %e, "CoordinatorEntity::attach: initial write failed");
        }
        Ok(id)
    }

    /// Stop listening; no-op if not attached
    pub async fn detach(&self) -> Result<bool, CoordinatorError> {
        debug!(entity_id = %self.entity_id, "CoordinatorEntity::detach: called");
        let id = self.observer_id.lock().unwrap_or_else(|e| e.into_inner()).take();
        match (id, self.coordinator.upgrade()) {
            (Some(id), Some(coordinator)) => coordinator.remove_observer(id).await,
            // Coordinator gone; its registry went with it
            _ => Ok(false),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.observer_id.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

impl<T> Observer for CoordinatorEntity<T>
where
    T: Send + Sync + 'static,
{
    fn on_update(&self) -> Result<()> {
        let state = self.state();
        (self.writer)(&self.entity_id, &state)
    }
}
