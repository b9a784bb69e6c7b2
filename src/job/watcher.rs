//! # Child watcher sink: orphan-cleanup reporting.
//!
//! The job reports every spawned pid into this one-way channel so an
//! out-of-process watchdog can kill orphans if the supervising program
//! itself dies. The core only publishes ids; it never reads them back,
//! and a missing or full watchdog never affects the job.

use tokio::sync::mpsc;

/// Write-only channel of spawned process ids.
///
/// Hand the receiving side to an external supervision agent (a companion
/// watchdog process, or platform machinery like process groups/job
/// objects/cgroups).
#[derive(Clone, Debug)]
pub struct ChildWatcherSink {
    tx: mpsc::UnboundedSender<u32>,
}

impl ChildWatcherSink {
    /// Creates a sink plus the receiver a watchdog drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<u32>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wraps an existing sender (e.g. one feeding IPC to a watchdog).
    pub fn from_sender(tx: mpsc::UnboundedSender<u32>) -> Self {
        Self { tx }
    }

    /// Reports one spawned pid. Best-effort: a gone watchdog is ignored.
    pub fn report(&self, pid: u32) {
        let _ = self.tx.send(pid);
    }
}
