//! Event stream for live observability
//!
//! Every commit a coordinator makes is also published as a
//! [`CoordinatorEvent`] on a broadcast channel:
//!
//! ```text
//!   refresh / push ──► Coordinator task ──► EventBus (broadcast)
//!                                              │
//!                         ┌────────────────────┼──────────────────┐
//!                         ▼                    ▼                  ▼
//!                     CLI printer         log forwarder      async entity
//! ```
//!
//! ```rust,ignore
//! let mut rx = handle.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: {}", event.name(), event.event_type());
//! }
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use types::CoordinatorEvent;
