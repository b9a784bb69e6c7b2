//! # Per-job runtime configuration.
//!
//! Provides [`JobConfig`], the settings one [`ProcessJob`](crate::ProcessJob)
//! runs under.
//!
//! ## Sentinel values
//! - `graceful_stop = 0s` → no grace window; the process is killed
//!   immediately on cancellation.
//! - Capacities are clamped to a minimum of 1 by the accessors.

use std::time::Duration;

/// Configuration for a single process job.
///
/// Defines:
/// - **Teardown behavior**: grace window before a forced kill
/// - **Detection latency**: readiness/liveness poll granularity
/// - **Channel sizing**: Outputs/Errors capacities and event bus capacity
///
/// ## Field semantics
/// - `graceful_stop`: wait this long for natural exit after cancellation
///   before killing (`0s` = kill immediately)
/// - `status_check_interval`: poll granularity for readiness gates and
///   publish-side liveness waits (shorter = snappier but busier)
/// - `outputs_capacity`: bounded Outputs channel; a full channel **blocks**
///   the stdout pump, propagating backpressure into the OS pipe
/// - `errors_capacity`: bounded Errors ring; a full ring **evicts** the
///   oldest entry to admit the newest
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to
/// avoid sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct JobConfig {
    /// Maximum time to wait for natural exit before force-killing.
    ///
    /// When the run token is cancelled:
    /// - with `graceful_stop > 0`, the job waits up to that long for the
    ///   process to exit on its own;
    /// - then (or immediately when `0s`) the process is killed.
    pub graceful_stop: Duration,

    /// Poll granularity for readiness and publish-side liveness checks.
    ///
    /// Bounds how quickly a liveness transition is observed by waiters.
    /// Exit detection itself uses the OS exit-wait, not this interval.
    pub status_check_interval: Duration,

    /// Capacity of the Outputs channel (block-on-full).
    pub outputs_capacity: usize,

    /// Capacity of the Errors ring (evict-oldest-on-full).
    pub errors_capacity: usize,

    /// Capacity of the event bus broadcast ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events
    /// skip older items.
    pub bus_capacity: usize,
}

impl JobConfig {
    /// Returns the graceful-stop window as an `Option`.
    ///
    /// - `None` → kill immediately on cancellation
    /// - `Some(d)` → wait up to `d` for natural exit first
    #[inline]
    pub fn graceful_timeout(&self) -> Option<Duration> {
        if self.graceful_stop == Duration::ZERO {
            None
        } else {
            Some(self.graceful_stop)
        }
    }

    /// Returns the poll interval clamped to a minimum of 1ms.
    #[inline]
    pub fn interval(&self) -> Duration {
        self.status_check_interval.max(Duration::from_millis(1))
    }

    /// Returns the Outputs capacity clamped to a minimum of 1.
    #[inline]
    pub fn outputs_capacity_clamped(&self) -> usize {
        self.outputs_capacity.max(1)
    }

    /// Returns the Errors capacity clamped to a minimum of 1.
    #[inline]
    pub fn errors_capacity_clamped(&self) -> usize {
        self.errors_capacity.max(1)
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for JobConfig {
    /// Default configuration:
    ///
    /// - `graceful_stop = 0s` (kill immediately on cancellation)
    /// - `status_check_interval = 100ms`
    /// - `outputs_capacity = 10_000` (block-on-full)
    /// - `errors_capacity = 10_000` (evict-oldest)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            graceful_stop: Duration::ZERO,
            status_check_interval: Duration::from_millis(100),
            outputs_capacity: 10_000,
            errors_capacity: 10_000,
            bus_capacity: 1024,
        }
    }
}
