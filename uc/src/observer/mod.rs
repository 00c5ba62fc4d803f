//! Observers of coordinator updates
//!
//! An observer is a parameterless hook invoked after each completed refresh.
//! It receives no payload: it re-reads the coordinator's published state
//! through its own [`CoordinatorHandle`](crate::coordinator::CoordinatorHandle).
//!
//! Hooks run on the coordinator task and must not block. Async consumers
//! should subscribe to the event stream instead.

mod entity;
mod registry;

use std::sync::Arc;

use eyre::Result;

pub use entity::{CoordinatorEntity, EntityState};
pub use registry::{NotifyReport, ObserverRegistry};

/// Hook invoked after every completed refresh
pub trait Observer: Send + Sync {
    fn on_update(&self) -> Result<()>;
}

impl<F> Observer for F
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn on_update(&self) -> Result<()> {
        (self)()
    }
}

/// Identity of a registered observer
///
/// Derived from the observer's allocation, so registering the same `Arc`
/// twice yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(usize);

impl ObserverId {
    pub fn of(observer: &Arc<dyn Observer>) -> Self {
        Self(Arc::as_ptr(observer) as *const () as usize)
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer-{:x}", self.0)
    }
}
