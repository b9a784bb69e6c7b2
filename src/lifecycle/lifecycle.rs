//! # Lifecycle: idempotent start/stop/restart over one runnable.
//!
//! ```text
//!            start()                     stop() / try_stop()
//! Stopped ────────────► Running ─────────────────────────► Stopped
//!    ▲   (spawns run     │  (cancel internal token,
//!    │    task, count+1) │   join task, swallow expected
//!    └───────────────────┘   cancellation, propagate faults)
//!
//! restart() = stop-if-running, then start   (count +1 exactly, any state)
//! ```
//!
//! ## Rules
//! - At most one active run task exists at any time (state changes happen
//!   under one mutex).
//! - `start` on a running shard is a **no-op**; `stop` on a stopped shard
//!   is a caller **error** (`NotRunning`); `try_stop` returns `false`
//!   instead.
//! - `run_count` increases only on a transition into `Running`.
//! - A finished background run is harvested by the next call that looks at
//!   the state; a non-cancellation fault propagates out of that call. This
//!   layer never retries; restart/backoff policy belongs to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{JobError, LifecycleError};
use crate::events::{Bus, Event, EventKind};

use super::runnable::RunnableRef;

/// Externally visible lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// No background run task is active.
    Stopped,
    /// A background run task was launched and not yet stopped/harvested.
    Running,
}

/// Handle to the active background run.
struct ActiveRun {
    token: CancellationToken,
    join: JoinHandle<Result<(), JobError>>,
}

struct Inner {
    state: LifecycleState,
    active: Option<ActiveRun>,
}

/// Wraps one [`Runnable`](super::Runnable) with controllable
/// start/stop/restart semantics and run-count bookkeeping.
pub struct Lifecycle {
    job: RunnableRef,
    bus: Bus,
    inner: Mutex<Inner>,
    run_count: AtomicU64,
}

impl Lifecycle {
    /// Creates a stopped lifecycle around `job`, publishing transitions to
    /// `bus` (share the job's own bus for correlated event streams).
    pub fn new(job: RunnableRef, bus: Bus) -> Self {
        Self {
            job,
            bus,
            inner: Mutex::new(Inner {
                state: LifecycleState::Stopped,
                active: None,
            }),
            run_count: AtomicU64::new(0),
        }
    }

    /// Identifier of the wrapped runnable.
    pub fn id(&self) -> &str {
        self.job.id()
    }

    /// Number of transitions into `Running` so far.
    pub fn run_count(&self) -> u64 {
        self.run_count.load(AtomicOrdering::SeqCst)
    }

    /// Current state.
    pub async fn state(&self) -> LifecycleState {
        self.inner.lock().await.state
    }

    /// Launches the run as a background task.
    ///
    /// No-op when already running (run count unchanged). A fault from a
    /// previously finished run propagates out of this call instead.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let mut inner = self.inner.lock().await;
        self.harvest(&mut inner).await?;
        if inner.state == LifecycleState::Running {
            return Ok(());
        }
        self.launch(&mut inner);
        Ok(())
    }

    /// Cancels the internal token and joins the background task.
    ///
    /// Errors with [`LifecycleError::NotRunning`] when already stopped:
    /// an explicit double-stop is a caller error, not silently ignored.
    /// The expected cancellation outcome is swallowed; any other fault
    /// propagates.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let mut inner = self.inner.lock().await;
        if inner.state == LifecycleState::Stopped {
            return Err(LifecycleError::NotRunning);
        }
        let active = inner.active.take();
        inner.state = LifecycleState::Stopped;

        // The lock stays held across the join so no start() interleaves
        // with a teardown still in flight.
        let res = match active {
            Some(run) => {
                run.token.cancel();
                Self::join_run(run.join).await
            }
            None => Ok(()),
        };
        self.bus
            .publish(Event::new(EventKind::ShardStopped).with_shard(self.job.id()));
        res
    }

    /// As [`Lifecycle::stop`], but returns `Ok(false)` instead of the
    /// `NotRunning` error; `Ok(true)` on a successful stop.
    pub async fn try_stop(&self) -> Result<bool, LifecycleError> {
        match self.stop().await {
            Ok(()) => Ok(true),
            Err(LifecycleError::NotRunning) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Unconditional stop-then-start, valid from either state. Increments
    /// the run count by exactly one.
    pub async fn restart(&self) -> Result<(), LifecycleError> {
        self.try_stop().await?;
        self.start().await
    }

    /// Observes a finished background run, if any, before acting on state.
    async fn harvest(&self, inner: &mut Inner) -> Result<(), LifecycleError> {
        let finished = matches!(&inner.active, Some(run) if run.join.is_finished());
        if !finished {
            return Ok(());
        }
        let active = inner.active.take();
        inner.state = LifecycleState::Stopped;
        match active {
            Some(run) => Self::join_run(run.join).await,
            None => Ok(()),
        }
    }

    /// Spawns the run task and transitions into `Running`.
    fn launch(&self, inner: &mut Inner) {
        let token = CancellationToken::new();
        let job = Arc::clone(&self.job);
        let child = token.clone();
        let join = tokio::spawn(async move { job.run(child).await });

        inner.active = Some(ActiveRun { token, join });
        inner.state = LifecycleState::Running;
        let run = self.run_count.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.bus.publish(
            Event::new(EventKind::ShardStarted)
                .with_shard(self.job.id())
                .with_run(run),
        );
    }

    /// Maps a joined run result: graceful outcomes are swallowed, faults
    /// and panics propagate.
    async fn join_run(join: JoinHandle<Result<(), JobError>>) -> Result<(), LifecycleError> {
        match join.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_cancellation() => Ok(()),
            Ok(Err(e)) => Err(LifecycleError::Job(e)),
            Err(join_err) => Err(LifecycleError::RunPanicked {
                reason: join_err.to_string(),
            }),
        }
    }
}
