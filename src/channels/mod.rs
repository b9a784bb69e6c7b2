//! # Shard message channels and backpressure policy.
//!
//! Every shard owns two independent bounded channels, deliberately
//! configured differently:
//!
//! | Channel | Bound behavior | Rationale |
//! |---------|----------------|-----------|
//! | Outputs | writer **blocks** until space frees | output order/completeness matter more than liveness; a slow consumer legitimately throttles the child via the OS pipe |
//! | Errors  | **oldest entry evicted** to admit the newest | diagnostics are best-effort; error volume must never stall the pipeline |
//!
//! [`RecordSink`] is the pump's write seam; the two senders implement it
//! with their respective policies.

mod errors;
mod message;
mod outputs;

use async_trait::async_trait;

pub use errors::Errors;
pub use message::ShardMessage;
pub use outputs::Outputs;

pub(crate) use errors::{errors_channel, ErrorsSender};
pub(crate) use outputs::{outputs_channel, OutputsSender};

/// The receiving side of a sink is gone; the pump should exit quietly.
pub(crate) struct SinkClosed;

/// Destination a pump delivers decoded records into.
///
/// Implementations define the full-channel policy: block (Outputs) or
/// evict-oldest (Errors).
#[async_trait]
pub(crate) trait RecordSink<T: Send>: Send + Sync {
    /// Delivers one message, applying this sink's backpressure policy.
    async fn deliver(&self, msg: ShardMessage<T>) -> Result<(), SinkClosed>;
}
