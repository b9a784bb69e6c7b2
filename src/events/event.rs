//! # Runtime events emitted by jobs, pumps, and the lifecycle layer.
//!
//! [`EventKind`] classifies events across three categories:
//! - **Lifecycle events**: shard start/stop transitions
//! - **Process events**: spawn, readiness, exit, and exit classifications
//! - **Pump events**: per-record decode failures and pump termination
//!
//! The [`Event`] struct carries correlation metadata: shard id, process id,
//! exit code, run number, stream kind, and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore exact order when events are observed
//! out of order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Which process stream an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// The child's stdout (pumped into Outputs).
    Stdout,
    /// The child's stderr (pumped into Errors).
    Stderr,
}

impl StreamKind {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle events ===
    /// A shard's background run task was launched.
    ///
    /// Sets: `shard`, `run` (new run count), `at`, `seq`.
    ShardStarted,

    /// A shard's background run task was stopped and joined.
    ///
    /// Sets: `shard`, `at`, `seq`.
    ShardStopped,

    // === Process events ===
    /// The OS process was spawned and its pid reported to the watcher sink.
    ///
    /// Sets: `shard`, `pid`, `at`, `seq`.
    ProcessSpawned,

    /// The readiness gate passed; pumps are starting.
    ///
    /// Sets: `shard`, `pid`, `at`, `seq`.
    ProcessReady,

    /// The process exited (any path).
    ///
    /// Sets: `shard`, `pid`, `code`, `at`, `seq`.
    ProcessExited,

    /// Cancelled run, but the process exited with a failure status.
    /// Warning only: cancellation wins over the exit code.
    ///
    /// Sets: `shard`, `pid`, `code`, `at`, `seq`.
    ExitAfterCancel,

    /// The process exited cleanly while the run was **not** cancelled.
    /// Deliberately distinct from both success and failure.
    ///
    /// Sets: `shard`, `pid`, `at`, `seq`.
    UnexpectedStop,

    /// Best-effort kill attempt failed during teardown. Swallowed.
    ///
    /// Sets: `shard`, `pid`, `reason`, `at`, `seq`.
    KillFailed,

    // === Pump events ===
    /// One record failed to decode; the pump continues.
    ///
    /// Sets: `shard`, `stream`, `reason`, `at`, `seq`.
    DecodeFailed,

    /// A pump exited (EOF, cancellation, or closed channel).
    ///
    /// Sets: `shard`, `stream`, `at`, `seq`.
    PumpStopped,

    // === Subscriber events ===
    /// A subscriber's queue was full or its worker gone; the event was
    /// dropped for that subscriber only.
    ///
    /// Sets: `subscriber`, `reason`, `at`, `seq`.
    SubscriberOverflow,

    /// A subscriber panicked while handling an event. Isolated; its
    /// worker keeps running.
    ///
    /// Sets: `subscriber`, `reason`, `at`, `seq`.
    SubscriberPanicked,
}

/// Runtime event with optional correlation metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Shard identifier, if applicable.
    pub shard: Option<Arc<str>>,
    /// OS process id, if applicable.
    pub pid: Option<u32>,
    /// Process exit code (`None` inside `Some` paths means signal-killed).
    pub code: Option<i32>,
    /// Lifecycle run count at the time of the event.
    pub run: Option<u64>,
    /// Which process stream the event refers to.
    pub stream: Option<StreamKind>,
    /// Subscriber name, for subscriber events.
    pub subscriber: Option<&'static str>,
    /// Human-readable reason (decode errors, kill failures, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            shard: None,
            pid: None,
            code: None,
            run: None,
            stream: None,
            subscriber: None,
            reason: None,
        }
    }

    /// Attaches a shard identifier.
    #[inline]
    pub fn with_shard(mut self, shard: impl Into<Arc<str>>) -> Self {
        self.shard = Some(shard.into());
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_code(mut self, code: Option<i32>) -> Self {
        self.code = code;
        self
    }

    /// Attaches a lifecycle run count.
    #[inline]
    pub fn with_run(mut self, run: u64) -> Self {
        self.run = Some(run);
        self
    }

    /// Attaches a stream kind.
    #[inline]
    pub fn with_stream(mut self, stream: StreamKind) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Attaches a subscriber name.
    #[inline]
    pub fn with_subscriber(mut self, subscriber: &'static str) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ProcessSpawned);
        let b = Event::new(EventKind::ProcessExited);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_set_fields() {
        let ev = Event::new(EventKind::DecodeFailed)
            .with_shard("worker-1")
            .with_stream(StreamKind::Stderr)
            .with_reason("bad record");
        assert_eq!(ev.shard.as_deref(), Some("worker-1"));
        assert_eq!(ev.stream, Some(StreamKind::Stderr));
        assert_eq!(ev.reason.as_deref(), Some("bad record"));
        assert_eq!(ev.pid, None);

        let ev = Event::new(EventKind::SubscriberOverflow)
            .with_subscriber("audit")
            .with_reason("queue full");
        assert_eq!(ev.subscriber, Some("audit"));
    }
}
