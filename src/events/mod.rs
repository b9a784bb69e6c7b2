//! # Runtime events and the broadcast bus.
//!
//! Process jobs, pumps, and the lifecycle layer report what happens to them
//! by publishing [`Event`]s onto a shared [`Bus`]. Subscribers (logging,
//! metrics, tests) observe the stream without ever blocking the publishers.
//!
//! - [`Event`] / [`EventKind`]: what happened, to which shard/process
//! - [`StreamKind`]: which process stream an event refers to
//! - [`Bus`]: non-blocking broadcast wrapper

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, StreamKind};
