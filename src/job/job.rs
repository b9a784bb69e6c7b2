//! # ProcessJob: spawn, pump, publish, classify.
//!
//! Owns one spawned worker process per run:
//!
//! ```text
//! run(token):
//!   ├─► spawn (ProcessSpec, pipes) ──► report pid to watcher sink
//!   ├─► readiness gate (probe poll, early-exit watch, cancellable)
//!   ├─► publish ProcessState::Running  (watch = one-shot handle per run)
//!   ├─► spawn pumps: stdout ─► Outputs (block-on-full)
//!   │                stderr ─► Errors  (evict-oldest)
//!   ├─► await: native exit-wait  OR  cancellation
//!   │            │                     └─► graceful wait (graceful_stop),
//!   │            │                         then kill (best-effort)
//!   ├─► stop pumps, clear stdin slot, publish exit state
//!   └─► classify:
//!         cancelled + success  → Ok
//!         cancelled + failure  → Ok   (+ ExitAfterCancel event)
//!         natural   + success  → Ok   (+ UnexpectedStop event)
//!         natural   + failure  → Err(ExitedWithFailure{shard,pid,code})
//! ```
//!
//! ## Rules
//! - At most one active run per job; a second `run` fails fast.
//! - The stdin slot's mutex **is** the publish guard: all writers are
//!   serialized, mutual exclusion only, no FIFO fairness.
//! - Process state is published through a `watch` channel: written by the
//!   run task, read lock-free by publish/readiness/diagnostics callers.
//! - Outputs/Errors channels belong to the job, not the run, so one
//!   consumer observes messages across restarts.

use std::sync::Arc;

use tokio::process::{Child, ChildStdin};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::channels::{errors_channel, outputs_channel, Errors, ErrorsSender, Outputs, OutputsSender};
use crate::codec::{Decode, Encode};
use crate::config::JobConfig;
use crate::error::JobError;
use crate::events::{Bus, Event, EventKind, StreamKind};

use super::diagnostics::{self, ProcessDiagnosticInfo};
use super::pump::pump;
use super::readiness::ReadinessProbe;
use super::spec::ProcessSpec;
use super::watcher::ChildWatcherSink;

/// Last published state of the job's worker process.
///
/// Written once per transition by the owning run task; read concurrently
/// and lock-free everywhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// No run has spawned a process yet.
    NotStarted,
    /// Spawned; the readiness gate has not passed.
    Starting {
        /// OS process id.
        pid: u32,
    },
    /// Alive and past the readiness gate.
    Running {
        /// OS process id.
        pid: u32,
    },
    /// Exited; `code` is `None` when killed by a signal.
    Exited {
        /// OS process id of the exited process.
        pid: u32,
        /// Exit code, if any.
        code: Option<i32>,
    },
}

impl ProcessState {
    /// True for `Starting` and `Running`.
    pub fn is_alive(&self) -> bool {
        matches!(self, ProcessState::Starting { .. } | ProcessState::Running { .. })
    }

    /// The pid, while one exists.
    pub fn pid(&self) -> Option<u32> {
        match self {
            ProcessState::NotStarted => None,
            ProcessState::Starting { pid }
            | ProcessState::Running { pid }
            | ProcessState::Exited { pid, .. } => Some(*pid),
        }
    }
}

/// Outcome of the readiness gate.
enum Gate {
    Ready,
    Exited(std::process::ExitStatus),
    Cancelled,
}

/// One shard's process job: spawns the worker, pumps its streams into
/// typed channels, serializes stdin publishes, and classifies the exit.
///
/// Type parameters: `I` inputs written to stdin, `O` stdout records,
/// `E` stderr records.
pub struct ProcessJob<I, O, E> {
    id: Arc<str>,
    spec: ProcessSpec,
    cfg: JobConfig,
    bus: Bus,

    encoder: Arc<dyn Encode<I>>,
    stdout_decoder: Arc<dyn Decode<Item = O>>,
    stderr_decoder: Arc<dyn Decode<Item = E>>,
    probe: Option<Arc<dyn ReadinessProbe>>,
    watcher: Option<ChildWatcherSink>,

    /// Held for the whole of `run`; enforces the single-run invariant.
    run_gate: Mutex<()>,
    /// The publish guard. Also the only place the stdin pipe lives.
    stdin: Mutex<Option<ChildStdin>>,
    state: watch::Sender<ProcessState>,

    outputs_tx: OutputsSender<O>,
    outputs_rx: std::sync::Mutex<Option<Outputs<O>>>,
    errors_tx: ErrorsSender<E>,
}

impl<I, O, E> ProcessJob<I, O, E>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Starts a builder; `encoder`/decoders are the injected codecs for
    /// stdin, stdout, and stderr respectively.
    pub fn builder(
        id: impl Into<Arc<str>>,
        spec: ProcessSpec,
        encoder: Arc<dyn Encode<I>>,
        stdout_decoder: Arc<dyn Decode<Item = O>>,
        stderr_decoder: Arc<dyn Decode<Item = E>>,
    ) -> ProcessJobBuilder<I, O, E> {
        ProcessJobBuilder {
            id: id.into(),
            spec,
            cfg: JobConfig::default(),
            bus: None,
            encoder,
            stdout_decoder,
            stderr_decoder,
            probe: None,
            watcher: None,
        }
    }

    /// Shard identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last published process state.
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Takes the single Outputs consumer handle. `None` after the first
    /// call.
    pub fn take_outputs(&self) -> Option<Outputs<O>> {
        self.outputs_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// New Errors subscription observing subsequent diagnostics.
    ///
    /// Subscribe before starting the shard to avoid missing early records.
    pub fn errors(&self) -> Errors<E> {
        self.errors_tx.subscribe()
    }

    /// New subscription to this job's runtime events.
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// The event bus this job publishes to (shared with the lifecycle
    /// layer when one wraps this job).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs the worker process to completion or cancellation.
    ///
    /// See the module docs for the full flow and exit classification.
    /// Spawn failures propagate immediately; liveness uses the native OS
    /// exit-wait rather than polling.
    pub async fn run(&self, token: CancellationToken) -> Result<(), JobError> {
        let _gate = self
            .run_gate
            .try_lock()
            .map_err(|_| JobError::AlreadyRunning { shard: Arc::clone(&self.id) })?;

        let mut child = self.spec.command().spawn().map_err(|e| JobError::Spawn {
            shard: Arc::clone(&self.id),
            source: e,
        })?;
        let pid = child.id().unwrap_or(0);

        if let Some(watcher) = &self.watcher {
            watcher.report(pid);
        }
        self.bus.publish(
            Event::new(EventKind::ProcessSpawned)
                .with_shard(Arc::clone(&self.id))
                .with_pid(pid),
        );

        let stdout = child.stdout.take().ok_or_else(|| self.io_err("stdout pipe missing"))?;
        let stderr = child.stderr.take().ok_or_else(|| self.io_err("stderr pipe missing"))?;
        let stdin = child.stdin.take().ok_or_else(|| self.io_err("stdin pipe missing"))?;
        *self.stdin.lock().await = Some(stdin);
        self.state.send_replace(ProcessState::Starting { pid });

        match self.await_ready(&mut child, pid, &token).await? {
            Gate::Exited(status) => return self.finish(pid, status, token.is_cancelled()).await,
            Gate::Cancelled => {
                let status = self.terminate(&mut child).await?;
                return self.finish(pid, status, true).await;
            }
            Gate::Ready => {}
        }

        self.state.send_replace(ProcessState::Running { pid });
        self.bus.publish(
            Event::new(EventKind::ProcessReady)
                .with_shard(Arc::clone(&self.id))
                .with_pid(pid),
        );

        let pump_token = token.child_token();
        let mut pumps = JoinSet::new();
        pumps.spawn(pump(
            Arc::clone(&self.id),
            StreamKind::Stdout,
            self.stdout_decoder.records(Box::new(stdout)),
            self.outputs_tx.clone(),
            self.bus.clone(),
            pump_token.clone(),
        ));
        pumps.spawn(pump(
            Arc::clone(&self.id),
            StreamKind::Stderr,
            self.stderr_decoder.records(Box::new(stderr)),
            self.errors_tx.clone(),
            self.bus.clone(),
            pump_token.clone(),
        ));

        let mut natural: Option<std::io::Result<std::process::ExitStatus>> = None;
        tokio::select! {
            status = child.wait() => natural = Some(status),
            _ = token.cancelled() => {}
        }
        let status = match natural {
            Some(status) => status.map_err(|e| JobError::Io {
                shard: Arc::clone(&self.id),
                source: e,
            })?,
            None => self.terminate(&mut child).await?,
        };

        // Cancellation stops pumps mid-stream; a natural exit lets them
        // drain to the pipes' EOF so the tail of the output is kept.
        if token.is_cancelled() {
            pump_token.cancel();
        }
        while pumps.join_next().await.is_some() {}

        self.finish(pid, status, token.is_cancelled()).await
    }

    /// Writes one input batch to the worker's stdin.
    ///
    /// Serialized against every other publisher by the publish guard.
    /// Waits (cancellable, at the configured interval) for a live+ready
    /// process first:
    /// - wait cancelled → [`JobError::PublishUnavailable`] with the last
    ///   known exit code;
    /// - process found dead with a failure status right after the write →
    ///   [`JobError::PublishedButCrashed`].
    pub async fn publish(&self, batch: &[I], token: &CancellationToken) -> Result<(), JobError> {
        // Wait for readiness before taking the guard: `run` needs the
        // stdin slot to install the pipe, so the order matters.
        let _pid = self.await_publishable(token).await?;
        let mut guard = self.stdin.lock().await;

        let writer = guard.as_mut().ok_or_else(|| JobError::PublishUnavailable {
            shard: Arc::clone(&self.id),
            last_exit: self.last_exit(),
        })?;

        if let Err(err) = self.encoder.write_batch(writer, batch).await {
            // A broken pipe usually means the worker died under us; prefer
            // the crash classification when the exit is already visible.
            if let Some((pid, code)) = self.crashed() {
                return Err(JobError::PublishedButCrashed {
                    shard: Arc::clone(&self.id),
                    pid,
                    code,
                });
            }
            return Err(JobError::PublishWrite {
                shard: Arc::clone(&self.id),
                source: err,
            });
        }

        if let Some((pid, code)) = self.crashed() {
            return Err(JobError::PublishedButCrashed {
                shard: Arc::clone(&self.id),
                pid,
                code,
            });
        }
        Ok(())
    }

    /// True iff the process is alive, the publish guard is currently
    /// uncontended, and the readiness probe (if any) holds.
    pub fn is_ready(&self) -> bool {
        let pid = match *self.state.borrow() {
            ProcessState::Running { pid } => pid,
            _ => return false,
        };
        if self.stdin.try_lock().is_err() {
            return false;
        }
        self.probe.as_ref().map_or(true, |p| p.is_ready(pid))
    }

    /// Point-in-time diagnostics; `None` whenever the process is not
    /// alive. Never fails for a dead process.
    pub fn diagnostics(&self) -> Option<ProcessDiagnosticInfo> {
        match *self.state.borrow() {
            ProcessState::Starting { pid } | ProcessState::Running { pid } => {
                diagnostics::snapshot(pid)
            }
            _ => None,
        }
    }

    // ---------------------------
    // Run internals
    // ---------------------------

    /// Polls the probe until ready, watching for early exit and
    /// cancellation. No probe means ready right after spawn.
    async fn await_ready(
        &self,
        child: &mut Child,
        pid: u32,
        token: &CancellationToken,
    ) -> Result<Gate, JobError> {
        loop {
            if let Some(status) = child.try_wait().map_err(|e| JobError::Io {
                shard: Arc::clone(&self.id),
                source: e,
            })? {
                return Ok(Gate::Exited(status));
            }
            match &self.probe {
                None => return Ok(Gate::Ready),
                Some(p) if p.is_ready(pid) => return Ok(Gate::Ready),
                Some(_) => {}
            }
            tokio::select! {
                _ = token.cancelled() => return Ok(Gate::Cancelled),
                _ = time::sleep(self.cfg.interval()) => {}
            }
        }
    }

    /// Cancellation teardown: graceful window first (when configured),
    /// then a best-effort kill. Kill failures are reported and swallowed,
    /// never escalated.
    async fn terminate(&self, child: &mut Child) -> Result<std::process::ExitStatus, JobError> {
        if let Some(grace) = self.cfg.graceful_timeout() {
            if let Ok(status) = time::timeout(grace, child.wait()).await {
                return status.map_err(|e| JobError::Io {
                    shard: Arc::clone(&self.id),
                    source: e,
                });
            }
        }
        if let Err(err) = child.start_kill() {
            self.bus.publish(
                Event::new(EventKind::KillFailed)
                    .with_shard(Arc::clone(&self.id))
                    .with_pid(child.id().unwrap_or(0))
                    .with_reason(err.to_string()),
            );
        }
        child.wait().await.map_err(|e| JobError::Io {
            shard: Arc::clone(&self.id),
            source: e,
        })
    }

    /// Publishes the exit, clears the stdin slot, classifies the outcome.
    ///
    /// State is updated before the stdin slot so a publisher blocked on
    /// the guard observes the exit as soon as it acquires it.
    async fn finish(
        &self,
        pid: u32,
        status: std::process::ExitStatus,
        cancelled: bool,
    ) -> Result<(), JobError> {
        self.state.send_replace(ProcessState::Exited { pid, code: status.code() });
        *self.stdin.lock().await = None;
        self.bus.publish(
            Event::new(EventKind::ProcessExited)
                .with_shard(Arc::clone(&self.id))
                .with_pid(pid)
                .with_code(status.code()),
        );

        match (cancelled, status.success()) {
            (true, true) => Ok(()),
            (true, false) => {
                // Cancellation wins over the exit code.
                self.bus.publish(
                    Event::new(EventKind::ExitAfterCancel)
                        .with_shard(Arc::clone(&self.id))
                        .with_pid(pid)
                        .with_code(status.code()),
                );
                Ok(())
            }
            (false, true) => {
                // Neither success nor failure: a distinct outcome the
                // caller can observe and decide about.
                self.bus.publish(
                    Event::new(EventKind::UnexpectedStop)
                        .with_shard(Arc::clone(&self.id))
                        .with_pid(pid),
                );
                Ok(())
            }
            (false, false) => Err(JobError::ExitedWithFailure {
                shard: Arc::clone(&self.id),
                pid,
                code: status.code(),
            }),
        }
    }

    /// Waits for a live process that passes the probe.
    async fn await_publishable(&self, token: &CancellationToken) -> Result<u32, JobError> {
        loop {
            let ready = match *self.state.borrow() {
                ProcessState::Running { pid } => match &self.probe {
                    None => Some(pid),
                    Some(p) if p.is_ready(pid) => Some(pid),
                    Some(_) => None,
                },
                _ => None,
            };
            if let Some(pid) = ready {
                return Ok(pid);
            }
            tokio::select! {
                _ = token.cancelled() => {
                    return Err(JobError::PublishUnavailable {
                        shard: Arc::clone(&self.id),
                        last_exit: self.last_exit(),
                    })
                }
                _ = time::sleep(self.cfg.interval()) => {}
            }
        }
    }

    fn crashed(&self) -> Option<(u32, Option<i32>)> {
        match *self.state.borrow() {
            ProcessState::Exited { pid, code } if code != Some(0) => Some((pid, code)),
            _ => None,
        }
    }

    fn last_exit(&self) -> Option<i32> {
        match *self.state.borrow() {
            ProcessState::Exited { code, .. } => code,
            _ => None,
        }
    }

    fn io_err(&self, what: &str) -> JobError {
        JobError::Io {
            shard: Arc::clone(&self.id),
            source: std::io::Error::other(what.to_string()),
        }
    }
}

/// Builder for [`ProcessJob`] with optional collaborators.
pub struct ProcessJobBuilder<I, O, E> {
    id: Arc<str>,
    spec: ProcessSpec,
    cfg: JobConfig,
    bus: Option<Bus>,
    encoder: Arc<dyn Encode<I>>,
    stdout_decoder: Arc<dyn Decode<Item = O>>,
    stderr_decoder: Arc<dyn Decode<Item = E>>,
    probe: Option<Arc<dyn ReadinessProbe>>,
    watcher: Option<ChildWatcherSink>,
}

impl<I, O, E> ProcessJobBuilder<I, O, E>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Replaces the default [`JobConfig`].
    pub fn with_config(mut self, cfg: JobConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Shares an existing event bus instead of creating a private one.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Sets the external readiness probe.
    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Sets the watchdog sink spawned pids are reported to.
    pub fn with_watcher(mut self, watcher: ChildWatcherSink) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Builds the job, allocating its channels from the config.
    pub fn build(self) -> ProcessJob<I, O, E> {
        let bus = self.bus.unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        let (outputs_tx, outputs_rx) = outputs_channel(self.cfg.outputs_capacity_clamped());
        let (errors_tx, _) = errors_channel(self.cfg.errors_capacity_clamped());
        let (state, _) = watch::channel(ProcessState::NotStarted);

        ProcessJob {
            id: self.id,
            spec: self.spec,
            cfg: self.cfg,
            bus,
            encoder: self.encoder,
            stdout_decoder: self.stdout_decoder,
            stderr_decoder: self.stderr_decoder,
            probe: self.probe,
            watcher: self.watcher,
            run_gate: Mutex::new(()),
            stdin: Mutex::new(None),
            state,
            outputs_tx,
            outputs_rx: std::sync::Mutex::new(Some(outputs_rx)),
            errors_tx,
        }
    }
}

#[async_trait::async_trait]
impl<I, O, E> crate::lifecycle::Runnable for ProcessJob<I, O, E>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
    E: Clone + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, token: CancellationToken) -> Result<(), JobError> {
        ProcessJob::run(self, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{LineDecoder, LineEncoder};

    fn line_job(spec: ProcessSpec) -> ProcessJob<String, String, String> {
        ProcessJob::builder(
            "test-shard",
            spec,
            Arc::new(LineEncoder),
            Arc::new(LineDecoder),
            Arc::new(LineDecoder),
        )
        .build()
    }

    #[test]
    fn test_process_state_helpers() {
        assert!(!ProcessState::NotStarted.is_alive());
        assert!(ProcessState::Starting { pid: 1 }.is_alive());
        assert!(ProcessState::Running { pid: 1 }.is_alive());
        assert!(!ProcessState::Exited { pid: 1, code: Some(0) }.is_alive());
        assert_eq!(ProcessState::NotStarted.pid(), None);
        assert_eq!(ProcessState::Running { pid: 9 }.pid(), Some(9));
    }

    #[tokio::test]
    async fn test_spawn_failure_propagates() {
        let job = line_job(ProcessSpec::new("shardvisor-no-such-binary"));
        let err = job.run(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "job_spawn_failed");
        assert_eq!(job.state(), ProcessState::NotStarted);
    }

    #[tokio::test]
    async fn test_outputs_taken_once() {
        let job = line_job(ProcessSpec::new("true"));
        assert!(job.take_outputs().is_some());
        assert!(job.take_outputs().is_none());
    }

    #[tokio::test]
    async fn test_not_ready_before_any_run() {
        let job = line_job(ProcessSpec::new("true"));
        assert!(!job.is_ready());
        assert!(job.diagnostics().is_none());
    }

    #[tokio::test]
    async fn test_publish_with_cancelled_wait_is_unavailable() {
        let job = line_job(ProcessSpec::new("true"));
        let token = CancellationToken::new();
        token.cancel();
        let err = job.publish(&["x".to_string()], &token).await.unwrap_err();
        assert!(matches!(err, JobError::PublishUnavailable { last_exit: None, .. }));
    }
}
