//! Update coordinator
//!
//! A coordinator owns one data source and fans its snapshots out to many
//! observers. It polls the source on a fixed interval, collapses concurrent
//! refresh requests into a single fetch, keeps the last good snapshot across
//! failures and tells observers when something changed.
//!
//! ```text
//!                 ┌──────────────┐   tick    ┌─────────────┐
//!   handles ────► │ Coordinator  │ ◄──────── │  Scheduler  │
//!   (mpsc)        │    task      │           └─────────────┘
//!                 │              │ ──fetch──► Fetch<T>
//!                 └──────┬───────┘
//!            watch ◄─────┼─────► observers (sync hooks)
//!                        └─────► EventBus (broadcast)
//! ```

mod config;
mod core;
mod error;
mod handle;
mod messages;
mod refresh;
mod state;

pub use config::CoordinatorConfig;
pub use self::core::Coordinator;
pub use error::{CoordinatorError, FailureInfo, FailureKind, FetchError};
pub use handle::{CoordinatorHandle, CoordinatorReader, WeakCoordinatorHandle};
pub use messages::{CoordRequest, CoordinatorMetrics, RefreshOutcome};
pub use refresh::{Fetch, RefreshResult};
pub use state::CoordinatorState;
