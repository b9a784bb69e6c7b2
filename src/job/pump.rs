//! # Stream pump: one decoded record stream → one channel.
//!
//! Drains a single process stream (stdout or stderr) through its decoder
//! into a sink, tagging each record with an ingestion timestamp.
//!
//! ## Rules
//! - Order is preserved **within** this stream; no ordering exists across
//!   streams.
//! - A per-record decode failure publishes `DecodeFailed` and continues;
//!   it never terminates the pump or the shard.
//! - Cancellation exits without draining buffered stream data; a record
//!   already read but not yet delivered may be lost.
//! - A closed sink means the consumer is gone: the pump exits silently,
//!   treated as normal shutdown.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::channels::{RecordSink, ShardMessage};
use crate::error::CodecError;
use crate::events::{Bus, Event, EventKind, StreamKind};

/// Runs one pump to completion.
///
/// Exits on stream EOF, cancellation, or sink closure, and publishes
/// `PumpStopped` on the way out.
pub(crate) async fn pump<T, S>(
    shard: Arc<str>,
    stream: StreamKind,
    mut records: BoxStream<'static, Result<T, CodecError>>,
    sink: S,
    bus: Bus,
    token: CancellationToken,
) where
    T: Send + 'static,
    S: RecordSink<T>,
{
    loop {
        let next = select! {
            _ = token.cancelled() => break,
            next = records.next() => next,
        };

        match next {
            None => break,
            Some(Ok(value)) => {
                let msg = ShardMessage::now(value);
                // A blocked deliver (full Outputs channel) must still
                // honor cancellation.
                let delivered = select! {
                    _ = token.cancelled() => break,
                    res = sink.deliver(msg) => res,
                };
                if delivered.is_err() {
                    break;
                }
            }
            Some(Err(err)) => {
                bus.publish(
                    Event::new(EventKind::DecodeFailed)
                        .with_shard(Arc::clone(&shard))
                        .with_stream(stream)
                        .with_reason(err.to_string()),
                );
            }
        }
    }

    bus.publish(
        Event::new(EventKind::PumpStopped)
            .with_shard(shard)
            .with_stream(stream),
    );
}
