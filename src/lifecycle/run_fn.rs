//! # Function-backed runnable (`RunFn`).
//!
//! [`RunFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a
//! fresh future per run. Each restart owns its own state; shared state goes
//! through an explicit `Arc` inside the closure.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

use super::runnable::Runnable;

/// Function-backed [`Runnable`] implementation.
///
/// ## Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use shardvisor::{RunFn, RunnableRef, JobError};
///
/// let r: RunnableRef = RunFn::arc("worker", |token: CancellationToken| async move {
///     token.cancelled().await;
///     Ok::<_, JobError>(())
/// });
/// assert_eq!(r.id(), "worker");
/// ```
#[derive(Debug)]
pub struct RunFn<F> {
    id: Cow<'static, str>,
    f: F,
}

impl<F> RunFn<F> {
    /// Creates a new function-backed runnable.
    pub fn new(id: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { id: id.into(), f }
    }

    /// Creates the runnable and returns it as a shared handle.
    pub fn arc(id: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(id, f))
    }
}

#[async_trait]
impl<F, Fut> Runnable for RunFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, token: CancellationToken) -> Result<(), JobError> {
        (self.f)(token).await
    }
}
