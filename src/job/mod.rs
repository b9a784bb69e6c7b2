//! # Process job: one supervised worker process.
//!
//! This module owns the spawn→pump→teardown lifecycle of a single OS
//! process:
//! - [`job`]: the [`ProcessJob`] itself: run loop, publish, readiness,
//!   exit classification;
//! - [`pump`]: drains one process stream into one channel;
//! - [`spec`]: the spawn descriptor;
//! - [`readiness`]: the external readiness probe seam;
//! - [`watcher`]: pid reporting for the out-of-process watchdog;
//! - [`diagnostics`]: live-process snapshots.

mod diagnostics;
mod job;
mod pump;
mod readiness;
mod spec;
mod watcher;

pub use diagnostics::ProcessDiagnosticInfo;
pub use job::{ProcessJob, ProcessJobBuilder, ProcessState};
pub use readiness::ReadinessProbe;
pub use spec::ProcessSpec;
pub use watcher::ChildWatcherSink;
