//! # Runnable: the async, cancelable unit a lifecycle supervises.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// Shared handle to a runnable, suitable for handing to a
/// [`Lifecycle`](crate::Lifecycle).
pub type RunnableRef = Arc<dyn Runnable>;

/// # A single long-lived run with cooperative cancellation.
///
/// Implementations should observe the token and exit promptly when it is
/// cancelled. Returning `Ok(())` or [`JobError::Canceled`] after a
/// cancellation both count as a graceful stop; any other error is a fault
/// the lifecycle layer surfaces to its caller.
///
/// [`ProcessJob`](crate::ProcessJob) implements this; so does
/// [`RunFn`](crate::RunFn) for closures.
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Stable identifier, used for event correlation.
    fn id(&self) -> &str;

    /// Executes one run until completion or cancellation.
    async fn run(&self, token: CancellationToken) -> Result<(), JobError>;
}
