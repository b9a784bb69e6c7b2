//! # External readiness probe.

/// Optional external probe gating when a spawned process counts as ready.
///
/// Consulted by the run loop's readiness gate (before pumps start) and by
/// publish-side waits, at the configured poll interval. Absence of a probe
/// means "ready immediately after spawn".
///
/// Implementations must be cheap and non-blocking; they run on the async
/// runtime's threads.
///
/// A plain closure works:
/// ```
/// use shardvisor::ReadinessProbe;
///
/// let probe = |pid: u32| pid != 0;
/// assert!(probe.is_ready(42));
/// ```
pub trait ReadinessProbe: Send + Sync + 'static {
    /// True when the process with `pid` is ready to accept input.
    fn is_ready(&self, pid: u32) -> bool;
}

impl<F> ReadinessProbe for F
where
    F: Fn(u32) -> bool + Send + Sync + 'static,
{
    fn is_ready(&self, pid: u32) -> bool {
        self(pid)
    }
}
