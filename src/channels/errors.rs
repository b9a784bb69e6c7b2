//! # Errors channel: bounded, evict-oldest-on-full.
//!
//! Built on [`tokio::sync::broadcast`], whose ring buffer keeps only the
//! most recent `capacity` entries. A reader that fell behind observes
//! `Lagged(n)`; the [`Errors`] handle absorbs that transparently, counts
//! the evictions, and resumes at the oldest retained entry. Delivery never
//! blocks the pump, so error volume cannot stall the pipeline.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{RecordSink, ShardMessage, SinkClosed};

/// Creates a bounded Errors ring pair.
pub(crate) fn errors_channel<T: Clone + Send>(capacity: usize) -> (ErrorsSender<T>, Errors<T>) {
    let (tx, rx) = broadcast::channel(capacity.max(1));
    (ErrorsSender { tx }, Errors { rx, evicted: 0 })
}

/// Write half held by the job; cloned into each run's stderr pump.
pub(crate) struct ErrorsSender<T> {
    tx: broadcast::Sender<ShardMessage<T>>,
}

impl<T> Clone for ErrorsSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Clone + Send> ErrorsSender<T> {
    /// New subscription observing subsequent diagnostics.
    pub(crate) fn subscribe(&self) -> Errors<T> {
        Errors {
            rx: self.tx.subscribe(),
            evicted: 0,
        }
    }
}

#[async_trait]
impl<T: Clone + Send> RecordSink<T> for ErrorsSender<T> {
    async fn deliver(&self, msg: ShardMessage<T>) -> Result<(), SinkClosed> {
        // Best-effort: with no subscriber the entry is dropped, and the
        // pump keeps running either way. Never reports closure.
        let _ = self.tx.send(msg);
        Ok(())
    }
}

/// Read half of the Errors ring.
///
/// Multiple independent subscriptions are allowed
/// ([`ProcessJob::errors`](crate::ProcessJob::errors)); each sees events
/// published after it subscribed, minus anything evicted while it lagged.
pub struct Errors<T> {
    rx: broadcast::Receiver<ShardMessage<T>>,
    evicted: u64,
}

impl<T: Clone + Send> Errors<T> {
    /// Receives the next retained message; `None` once the job is dropped.
    ///
    /// Evictions are absorbed silently (counted via [`Errors::evicted`])
    /// and reception resumes at the oldest retained entry.
    pub async fn recv(&mut self) -> Option<ShardMessage<T>> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.evicted += n;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive; `None` when currently empty or closed.
    pub fn try_recv(&mut self) -> Option<ShardMessage<T>> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    self.evicted += n;
                }
                Err(_) => return None,
            }
        }
    }

    /// Total entries evicted past this reader so far.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
