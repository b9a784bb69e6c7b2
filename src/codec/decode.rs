//! # Decoder trait: process stream → lazy record sequence.

use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use crate::error::CodecError;

/// Type-erased readable half of a process pipe.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// # Turns one byte stream into a lazy sequence of records.
///
/// The returned stream is consumed exactly once by a pump, lives as long as
/// the underlying pipe, and ends at EOF or after an unrecoverable io error.
///
/// ## Rules
/// - A `Malformed` item is **per-record**: the stream must keep yielding
///   subsequent records after it. The pump reports the failure and moves on.
/// - An `Io` item may end the stream; the pipe is gone.
/// - Implementations must not buffer unboundedly; yield records as they
///   are framed.
pub trait Decode: Send + Sync + 'static {
    /// The record type this decoder produces.
    type Item: Send + 'static;

    /// Wraps `reader` into a lazy record stream.
    fn records(&self, reader: ByteReader) -> BoxStream<'static, Result<Self::Item, CodecError>>;
}
