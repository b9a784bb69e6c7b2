//! # Outputs channel: bounded, block-on-full.
//!
//! Built on [`tokio::sync::mpsc`]. When the channel is full, the pump's
//! `deliver` awaits; the pump then stops reading the pipe, the OS pipe
//! buffer fills, and the child's own writes eventually stall. That chain
//! is the intended backpressure path and must be preserved.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{RecordSink, ShardMessage, SinkClosed};

/// Creates a bounded Outputs channel pair.
pub(crate) fn outputs_channel<T: Send>(capacity: usize) -> (OutputsSender<T>, Outputs<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (OutputsSender { tx }, Outputs { rx })
}

/// Write half held by the job; cloned into each run's stdout pump.
pub(crate) struct OutputsSender<T> {
    tx: mpsc::Sender<ShardMessage<T>>,
}

impl<T> Clone for OutputsSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

#[async_trait]
impl<T: Send> RecordSink<T> for OutputsSender<T> {
    async fn deliver(&self, msg: ShardMessage<T>) -> Result<(), SinkClosed> {
        self.tx.send(msg).await.map_err(|_| SinkClosed)
    }
}

/// Read half of the Outputs channel; strict FIFO within the stream.
///
/// Single consumer: taken once from the job via
/// [`ProcessJob::take_outputs`](crate::ProcessJob::take_outputs). The
/// channel spans restarts, so one consumer observes every run of the shard.
pub struct Outputs<T> {
    rx: mpsc::Receiver<ShardMessage<T>>,
}

impl<T> Outputs<T> {
    /// Receives the next message; `None` once the job is dropped and the
    /// channel is drained.
    pub async fn recv(&mut self) -> Option<ShardMessage<T>> {
        self.rx.recv().await
    }

    /// Non-blocking receive; `None` when currently empty or closed.
    pub fn try_recv(&mut self) -> Option<ShardMessage<T>> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = outputs_channel::<u32>(8);
        for i in 0..5 {
            tx.deliver(ShardMessage::now(i)).await.ok();
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap().into_value(), i);
        }
    }

    #[tokio::test]
    async fn test_full_channel_blocks_writer() {
        let (tx, mut rx) = outputs_channel::<u32>(1);
        tx.deliver(ShardMessage::now(1)).await.ok();

        // Second deliver must not complete until the consumer makes room.
        let pending = tx.deliver(ShardMessage::now(2));
        tokio::pin!(pending);
        assert!(futures::poll!(pending.as_mut()).is_pending());

        assert_eq!(rx.recv().await.unwrap().into_value(), 1);
        assert!(pending.await.is_ok());
        assert_eq!(rx.recv().await.unwrap().into_value(), 2);
    }

    #[tokio::test]
    async fn test_closed_receiver_signals_sink_closed() {
        let (tx, rx) = outputs_channel::<u32>(1);
        drop(rx);
        assert!(tx.deliver(ShardMessage::now(1)).await.is_err());
    }
}
