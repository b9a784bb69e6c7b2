//! Error types used by the shardvisor runtime.
//!
//! This module defines three error enums:
//!
//! - [`JobError`]: failures of one process job run or publish attempt.
//! - [`LifecycleError`]: failures of the start/stop/restart layer.
//! - [`CodecError`]: failures at the (de)serializer boundary.
//!
//! All types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics, plus `is_cancellation` to separate caller errors of the
//! cancellation kind from genuine faults.

use std::sync::Arc;
use thiserror::Error;

/// # Errors produced at the stream (de)serializer boundary.
///
/// `Malformed` is a per-record failure: the pump logs it and keeps reading.
/// `Io` means the underlying pipe failed; the record stream ends after it.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodecError {
    /// A single record could not be decoded. Isolated; never fatal.
    #[error("malformed record: {reason}")]
    Malformed {
        /// What the decoder rejected, with the offending input where useful.
        reason: String,
    },

    /// The underlying stream failed.
    #[error("stream io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CodecError::Malformed { .. } => "codec_malformed",
            CodecError::Io(_) => "codec_io",
        }
    }
}

/// # Errors produced by a process job.
///
/// These surface to the caller and the [`Lifecycle`](crate::Lifecycle)
/// layer so it can decide on restart/backoff. The job itself never retries.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JobError {
    /// The process could not be spawned. Fatal to the run attempt,
    /// propagated synchronously out of `run`.
    #[error("shard {shard}: failed to spawn process: {source}")]
    Spawn {
        /// Shard identifier.
        shard: Arc<str>,
        /// The spawn error.
        #[source]
        source: std::io::Error,
    },

    /// Pipe wiring or exit-wait failed at the OS boundary.
    #[error("shard {shard}: process io failure: {source}")]
    Io {
        /// Shard identifier.
        shard: Arc<str>,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a failure status while the run was **not**
    /// cancelled. Carries everything a caller needs to correlate logs.
    #[error("shard {shard}: process {pid} exited with failure (code {code:?})")]
    ExitedWithFailure {
        /// Shard identifier.
        shard: Arc<str>,
        /// OS process id.
        pid: u32,
        /// Exit code; `None` when the process was killed by a signal.
        code: Option<i32>,
    },

    /// A publish waited for a live+ready process until the wait itself was
    /// cancelled, or no stdin was available.
    #[error("shard {shard}: unable to publish (last exit code {last_exit:?})")]
    PublishUnavailable {
        /// Shard identifier.
        shard: Arc<str>,
        /// Last known exit code of the process, if it ever exited.
        last_exit: Option<i32>,
    },

    /// The batch was written, but the process was then found dead with a
    /// failure status. The input may or may not have been consumed.
    #[error("shard {shard}: published but process {pid} crashed (code {code:?})")]
    PublishedButCrashed {
        /// Shard identifier.
        shard: Arc<str>,
        /// OS process id.
        pid: u32,
        /// Exit code observed after the write.
        code: Option<i32>,
    },

    /// Serializing the batch to stdin failed.
    #[error("shard {shard}: failed to write batch to stdin: {source}")]
    PublishWrite {
        /// Shard identifier.
        shard: Arc<str>,
        /// The codec/io error.
        #[source]
        source: CodecError,
    },

    /// A second `run` was attempted while one is in flight. At most one
    /// active run exists per job.
    #[error("shard {shard}: run already in progress")]
    AlreadyRunning {
        /// Shard identifier.
        shard: Arc<str>,
    },

    /// The run was cancelled by the caller-supplied token.
    ///
    /// `ProcessJob::run` itself returns `Ok(())` on cancellation; this
    /// variant exists for other [`Runnable`](crate::Runnable)
    /// implementations. The lifecycle layer swallows it on `stop`.
    #[error("run cancelled")]
    Canceled,
}

impl JobError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use shardvisor::JobError;
    ///
    /// let err = JobError::ExitedWithFailure {
    ///     shard: "worker-1".into(),
    ///     pid: 42,
    ///     code: Some(3),
    /// };
    /// assert_eq!(err.as_label(), "job_exited_with_failure");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Spawn { .. } => "job_spawn_failed",
            JobError::Io { .. } => "job_io",
            JobError::ExitedWithFailure { .. } => "job_exited_with_failure",
            JobError::PublishUnavailable { .. } => "job_publish_unavailable",
            JobError::PublishedButCrashed { .. } => "job_published_but_crashed",
            JobError::PublishWrite { .. } => "job_publish_write",
            JobError::AlreadyRunning { .. } => "job_already_running",
            JobError::Canceled => "job_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// True when the error is of the cancellation kind (expected during
    /// shutdown, swallowed by the lifecycle layer's `stop`).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::Canceled)
    }
}

/// # Errors produced by the lifecycle layer.
///
/// `NotRunning` is the cancellation-kind error an explicit double-stop
/// raises; everything else wraps a fault from the wrapped runnable.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// `stop` was called while already stopped. Caller error, not
    /// silently ignored (use `try_stop` for the tolerant form).
    #[error("shard is not running")]
    NotRunning,

    /// The background run task panicked.
    #[error("run task panicked: {reason}")]
    RunPanicked {
        /// Panic payload, stringified.
        reason: String,
    },

    /// The wrapped runnable faulted with a non-cancellation error.
    #[error(transparent)]
    Job(#[from] JobError),
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::NotRunning => "lifecycle_not_running",
            LifecycleError::RunPanicked { .. } => "lifecycle_run_panicked",
            LifecycleError::Job(e) => e.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// True when the error is of the cancellation kind.
    pub fn is_cancellation(&self) -> bool {
        match self {
            LifecycleError::NotRunning => true,
            LifecycleError::Job(e) => e.is_cancellation(),
            LifecycleError::RunPanicked { .. } => false,
        }
    }
}
