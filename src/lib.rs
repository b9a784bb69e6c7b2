//! # shardvisor
//!
//! **Shardvisor** is a process-shard supervision library for Rust.
//!
//! It runs one external worker process per shard, pumps the worker's stdout
//! and stderr into typed channels, serializes batch publishes to its stdin,
//! and exposes idempotent start/stop/restart semantics on top. The crate is
//! a building block for sharded pipelines where each shard is backed by a
//! long-lived child process speaking a line (or custom) protocol.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                 ┌───────────────────────────────┐
//!                 │   Lifecycle (start/stop/      │
//!                 │   restart, run counting)      │
//!                 └──────────────┬────────────────┘
//!                                │ run(token)
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ProcessJob                                                  │
//! │  - spawns the worker from a ProcessSpec (all stdio piped)    │
//! │  - readiness gate (ReadinessProbe, polled)                   │
//! │  - publish(batch): Encode ──► stdin  (mutex-serialized)      │
//! │  - exit classification on teardown                           │
//! └───────┬───────────────────────┬──────────────────────┬───────┘
//!         │ stdout                │ stderr               │ events
//!         ▼                       ▼                      ▼
//!   pump + Decode           pump + Decode         Bus (broadcast)
//!         │                       │                      │
//!         ▼                       ▼               SubscriberSet
//!   Outputs<O>               Errors<E>           (per-sub queues)
//!   (bounded mpsc,           (broadcast ring,           │
//!    blocks on full)          evicts oldest)       LogWriter, ...
//! ```
//!
//! ### One run
//! ```text
//! ProcessJob::run(token)
//!   ├─► spawn worker (ProcessSpec ─► piped stdio), report pid to watcher
//!   ├─► await readiness (probe polled at status_check_interval)
//!   ├─► start stdout/stderr pumps (decoded records, timestamped)
//!   ├─► select:
//!   │     ├─ child exits naturally ─► pumps drain to EOF
//!   │     └─ token cancelled ───────► graceful stop (grace, then kill)
//!   └─► classify exit:
//!         cancelled              ─► Ok (failure code: ExitAfterCancel event)
//!         natural + success code ─► Ok + UnexpectedStop event
//!         natural + failure code ─► Err(ExitedWithFailure)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Process jobs**  | Spawn, watch, and tear down one worker process per shard.    | [`ProcessJob`], [`ProcessSpec`]           |
//! | **Codecs**        | Typed stdin/stdout/stderr framing at the pipe boundary.      | [`Encode`], [`Decode`], [`LineDecoder`]   |
//! | **Channels**      | Backpressure for outputs, bounded retention for errors.      | [`Outputs`], [`Errors`], [`ShardMessage`] |
//! | **Lifetime**      | Idempotent start/stop/restart with run counting.             | [`Lifecycle`], [`Runnable`], [`RunFn`]    |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, watchdogs).      | [`Subscribe`], [`SubscriberSet`]          |
//! | **Errors**        | Typed errors with stable labels and cancellation kinds.      | [`JobError`], [`LifecycleError`]          |
//! | **Configuration** | Centralize per-job settings.                                 | [`JobConfig`]                             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use shardvisor::{
//!     JobConfig, LineDecoder, LineEncoder, Lifecycle, ProcessJob, ProcessSpec,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = JobConfig::default();
//!     cfg.graceful_stop = Duration::from_secs(5);
//!
//!     let job = Arc::new(
//!         ProcessJob::builder(
//!             "echo-shard",
//!             ProcessSpec::new("cat"),
//!             Arc::new(LineEncoder),
//!             Arc::new(LineDecoder),
//!             Arc::new(LineDecoder),
//!         )
//!         .with_config(cfg)
//!         .build(),
//!     );
//!     let mut outputs = job.take_outputs().ok_or("outputs already taken")?;
//!
//!     let lifecycle = Lifecycle::new(job.clone(), job.bus().clone());
//!     lifecycle.start().await?;
//!
//!     job.publish(&["hello".to_string()], &CancellationToken::new()).await?;
//!     if let Some(msg) = outputs.recv().await {
//!         println!("shard answered: {}", msg.value());
//!     }
//!
//!     lifecycle.stop().await?;
//!     Ok(())
//! }
//! ```

mod channels;
mod codec;
mod config;
mod error;
mod events;
mod job;
mod lifecycle;
mod subscribers;

pub use channels::{Errors, Outputs, ShardMessage};
pub use codec::{ByteReader, Decode, Encode, LineDecoder, LineEncoder, ParseLineDecoder};
pub use config::JobConfig;
pub use error::{CodecError, JobError, LifecycleError};
pub use events::{Bus, Event, EventKind, StreamKind};
pub use job::{
    ChildWatcherSink, ProcessDiagnosticInfo, ProcessJob, ProcessJobBuilder, ProcessSpec,
    ProcessState, ReadinessProbe,
};
pub use lifecycle::{Lifecycle, LifecycleState, RunFn, Runnable, RunnableRef};
pub use subscribers::{Subscribe, SubscriberSet};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
