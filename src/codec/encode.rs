//! # Encoder trait: input batch → process stdin.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::CodecError;

/// # Writes a batch of inputs to a process stdin stream.
///
/// Called under the job's publish guard, so implementations never see
/// interleaved batches. An implementation should flush before returning:
/// the caller treats a returned `Ok` as "the batch reached the pipe".
#[async_trait]
pub trait Encode<T>: Send + Sync + 'static {
    /// Serializes `batch` to `writer` and flushes.
    async fn write_batch(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        batch: &[T],
    ) -> Result<(), CodecError>;
}
