//! Update Coordinator - one polling source, many observers
//!
//! A coordinator sits between a data source that is expensive to query (a
//! cloud API, a device on the LAN) and the many dependents that want its
//! data. It fetches on a fixed interval, shares one in-flight fetch between
//! every concurrent request, keeps the last good snapshot when a fetch fails,
//! and tells its observers after each refresh.
//!
//! # Core Concepts
//!
//! - **One fetch at a time**: concurrent refresh requests join the operation
//!   already in flight and all see its outcome
//! - **Stale beats empty**: a failed refresh never clears the cached snapshot
//! - **Loud once, quiet after**: the first failure of a streak is logged at
//!   warning level, repeats at debug, recovery at info
//! - **Observers are hooks**: they get no payload and re-read the published
//!   state, so they always see exactly one completed refresh
//!
//! # Modules
//!
//! - [`coordinator`] - the coordinator task, its handle and error types
//! - [`scheduler`] - the periodic refresh timer
//! - [`observer`] - observer registry and the coordinator-backed entity
//! - [`events`] - broadcast stream of coordinator events
//! - [`source`] - the HTTP JSON source used by the `uc` binary
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//!
//! ```rust,ignore
//! let (handle, task) = Coordinator::spawn(CoordinatorConfig::named("weather"), fetch_weather);
//! handle.first_refresh().await?;
//! handle.start().await?;
//! let current = handle.get_data();
//! ```

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod observer;
pub mod scheduler;
pub mod source;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{
    CoordRequest, Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle, CoordinatorMetrics,
    CoordinatorReader, CoordinatorState, FailureInfo, FailureKind, Fetch, FetchError, RefreshOutcome, RefreshResult,
    WeakCoordinatorHandle,
};
pub use events::{CoordinatorEvent, EventBus};
pub use observer::{CoordinatorEntity, EntityState, Observer, ObserverId, ObserverRegistry};
pub use scheduler::{MIN_INTERVAL, Scheduler, SchedulerState};
pub use source::{HttpSource, SourceConfig};
