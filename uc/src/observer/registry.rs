//! Observer registry

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{Observer, ObserverId};

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub notified: usize,
    pub failed: usize,
}

/// Set of observers, unique per identity
///
/// Owned by the coordinator task; no interior locking.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: HashMap<ObserverId, Arc<dyn Observer>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; registering the same one again is a no-op
    pub fn add(&mut self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId::of(&observer);
        if self.observers.contains_key(&id) {
            debug!(%id, "ObserverRegistry::add: already registered");
        } else {
            debug!(%id, "ObserverRegistry::add: registered");
            self.observers.insert(id, observer);
        }
        id
    }

    /// Deregister an observer; returns false if it was not registered
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let removed = self.observers.remove(&id).is_some();
        debug!(%id, removed, "ObserverRegistry::remove: called");
        removed
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Drop every observer (coordinator unload)
    pub fn clear(&mut self) {
        self.observers.clear();
    }

    /// Invoke every observer
    ///
    /// Order is unspecified. An observer that returns an error or panics is
    /// logged and counted; the remaining observers still run.
    pub fn notify_all(&self, name: &str) -> NotifyReport {
        let mut report = NotifyReport::default();

        for (id, observer) in &self.observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_update())) {
                Ok(Ok(())) => report.notified += 1,
                Ok(Err(e)) => {
                    warn!(%name, %id, error = %e, "Observer failed to handle update");
                    report.failed += 1;
                }
                Err(_) => {
                    error!(%name, %id, "Observer panicked while handling update");
                    report.failed += 1;
                }
            }
        }

        debug!(%name, notified = report.notified, failed = report.failed, "ObserverRegistry::notify_all: done");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Arc<dyn Observer> {
        let counter = counter.clone();
        Arc::new(move || -> eyre::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let observer = counting(&counter);

        let first = registry.add(observer.clone());
        let second = registry.add(observer);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);

        registry.notify_all("test");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = registry.add(counting(&counter));

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failing_observer_is_isolated() {
        let mut registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let failing: Arc<dyn Observer> = Arc::new(|| -> eyre::Result<()> { Err(eyre::eyre!("entity store unavailable")) });
        let panicking: Arc<dyn Observer> = Arc::new(|| -> eyre::Result<()> { panic!("observer bug") });
        registry.add(failing);
        registry.add(panicking);
        registry.add(counting(&counter));

        let report = registry.notify_all("test");
        assert_eq!(report, NotifyReport { notified: 1, failed: 2 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_releases_observers() {
        let mut registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let observer = counting(&counter);
        let id = registry.add(observer.clone());
        assert_eq!(Arc::strong_count(&observer), 2);

        registry.clear();
        assert!(!registry.contains(id));
        assert_eq!(Arc::strong_count(&observer), 1);
    }
}
