//! # Event subscribers for the shardvisor runtime.
//!
//! Provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out that
//! drains a [`Bus`](crate::events::Bus) without ever blocking publishers.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   ProcessJob / Lifecycle ── publish(Event) ──► Bus
//!                                                 │
//!                                          SubscriberSet::listen
//!                                                 │
//!                                 ┌───────────────┼───────────────┐
//!                                 ▼               ▼               ▼
//!                             LogWriter        Metrics         Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use shardvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct ExitCounter;
//!
//! #[async_trait]
//! impl Subscribe for ExitCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ProcessExited {
//!             // increment counter
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
