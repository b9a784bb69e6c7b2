//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [shard-started] shard=ingest-1 run=1
//! [spawned] shard=ingest-1 pid=4242
//! [ready] shard=ingest-1 pid=4242
//! [decode-failed] shard=ingest-1 stream=stdout reason="malformed record: ..."
//! [pump-stopped] shard=ingest-1 stream=stdout
//! [exited] shard=ingest-1 pid=4242 code=Some(0)
//! [unexpected-stop] shard=ingest-1 pid=4242
//! [shard-stopped] shard=ingest-1
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ShardStarted => {
                if let (Some(shard), Some(run)) = (&e.shard, e.run) {
                    println!("[shard-started] shard={shard} run={run}");
                }
            }
            EventKind::ShardStopped => {
                println!("[shard-stopped] shard={:?}", e.shard);
            }
            EventKind::ProcessSpawned => {
                println!("[spawned] shard={:?} pid={:?}", e.shard, e.pid);
            }
            EventKind::ProcessReady => {
                println!("[ready] shard={:?} pid={:?}", e.shard, e.pid);
            }
            EventKind::ProcessExited => {
                println!(
                    "[exited] shard={:?} pid={:?} code={:?}",
                    e.shard, e.pid, e.code
                );
            }
            EventKind::ExitAfterCancel => {
                println!(
                    "[exit-after-cancel] shard={:?} pid={:?} code={:?}",
                    e.shard, e.pid, e.code
                );
            }
            EventKind::UnexpectedStop => {
                println!("[unexpected-stop] shard={:?} pid={:?}", e.shard, e.pid);
            }
            EventKind::KillFailed => {
                println!(
                    "[kill-failed] shard={:?} pid={:?} reason={:?}",
                    e.shard, e.pid, e.reason
                );
            }
            EventKind::DecodeFailed => {
                println!(
                    "[decode-failed] shard={:?} stream={:?} reason={:?}",
                    e.shard,
                    e.stream.map(|s| s.as_label()),
                    e.reason
                );
            }
            EventKind::PumpStopped => {
                println!(
                    "[pump-stopped] shard={:?} stream={:?}",
                    e.shard,
                    e.stream.map(|s| s.as_label())
                );
            }
            EventKind::SubscriberOverflow => {
                println!(
                    "[subscriber-overflow] subscriber={:?} reason={:?}",
                    e.subscriber, e.reason
                );
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={:?} reason={:?}",
                    e.subscriber, e.reason
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
