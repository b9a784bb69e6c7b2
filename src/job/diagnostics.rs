//! # Point-in-time process diagnostics.
//!
//! Read-only snapshot of a live process, produced on demand from `/proc`
//! on Linux. A dead process yields `None`: signaled, never an error.

use std::time::Duration;

/// Snapshot of a live worker process.
#[derive(Clone, Debug)]
pub struct ProcessDiagnosticInfo {
    /// Private (data) memory, bytes.
    pub private_memory_bytes: u64,
    /// Resident set, bytes.
    pub working_set_bytes: u64,
    /// Executable name as the kernel reports it.
    pub module_name: String,
    /// Accumulated user + system CPU time.
    pub total_processor_time: Duration,
}

/// Reads a snapshot for `pid`; `None` when the process is gone or the
/// platform exposes no procfs.
#[cfg(target_os = "linux")]
pub(crate) fn snapshot(pid: u32) -> Option<ProcessDiagnosticInfo> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let comm = std::fs::read_to_string(format!("/proc/{pid}/comm")).ok()?;
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;

    let working_set_bytes = status_kb(&status, "VmRSS:")? * 1024;
    let private_memory_bytes = status_kb(&status, "VmData:").unwrap_or(0) * 1024;
    let total_processor_time = cpu_time(&stat)?;

    Some(ProcessDiagnosticInfo {
        private_memory_bytes,
        working_set_bytes,
        module_name: comm.trim().to_string(),
        total_processor_time,
    })
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn snapshot(_pid: u32) -> Option<ProcessDiagnosticInfo> {
    None
}

/// Extracts a `kB` field from `/proc/<pid>/status`.
#[cfg(target_os = "linux")]
fn status_kb(status: &str, key: &str) -> Option<u64> {
    status
        .lines()
        .find(|l| l.starts_with(key))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

/// Sums utime+stime from `/proc/<pid>/stat`.
///
/// Fields are taken after the parenthesized comm to survive spaces in the
/// executable name. USER_HZ is 100 on every mainstream kernel config.
#[cfg(target_os = "linux")]
fn cpu_time(stat: &str) -> Option<Duration> {
    const TICKS_PER_SEC: u64 = 100;
    let rest = stat.rsplit_once(')')?.1;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // After ')' the state flag is field 0, so utime/stime land at 11/12.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(Duration::from_millis((utime + stime) * 1000 / TICKS_PER_SEC))
}
