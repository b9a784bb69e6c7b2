//! # Shard lifetime management.
//!
//! Translates a single blocking `run` into idempotent, controllable
//! start/stop semantics:
//! - [`Runnable`]: the async, cancelable unit a lifecycle wraps
//!   (a [`ProcessJob`](crate::ProcessJob), or anything else);
//! - [`RunFn`]: function-backed [`Runnable`] for composition and tests;
//! - [`Lifecycle`]: the `{Stopped, Running}` state machine with
//!   run-count bookkeeping.

mod lifecycle;
mod run_fn;
mod runnable;

pub use lifecycle::{Lifecycle, LifecycleState};
pub use run_fn::RunFn;
pub use runnable::{Runnable, RunnableRef};
