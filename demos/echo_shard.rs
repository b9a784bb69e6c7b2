//! # Example: echo_shard
//!
//! Runs `cat` as a shard worker: lines published to stdin come back on
//! stdout as typed output records. Demonstrates how to:
//! - Describe the worker with a [`ProcessSpec`].
//! - Build a [`ProcessJob`] with line codecs on all three pipes.
//! - Drive it through a [`Lifecycle`] (start, publish, restart, stop).
//! - Watch runtime events with the built-in [`LogWriter`] subscriber.
//!
//! ## Flow
//! ```text
//! ProcessSpec("cat") ──► ProcessJob ──► Lifecycle::start()
//!     ├─► publish(["one", "two"]) ──► cat stdin
//!     ├─► Outputs.recv() ◄── cat stdout (decoded lines)
//!     ├─► Lifecycle::restart()  (fresh process, same channels)
//!     └─► Lifecycle::stop()     (graceful teardown)
//! ```
//!
//! Run with: `cargo run --example echo_shard --features logging`

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use shardvisor::{
    JobConfig, Lifecycle, LineDecoder, LineEncoder, LogWriter, ProcessJob, ProcessSpec,
    Subscribe, SubscriberSet,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut cfg = JobConfig::default();
    cfg.graceful_stop = Duration::from_secs(2);

    let job = Arc::new(
        ProcessJob::builder(
            "echo-shard",
            ProcessSpec::new("cat"),
            Arc::new(LineEncoder),
            Arc::new(LineDecoder),
            Arc::new(LineDecoder),
        )
        .with_config(cfg)
        .build(),
    );
    let mut outputs = job
        .take_outputs()
        .ok_or_else(|| anyhow::anyhow!("outputs already taken"))?;

    // Event logging through the subscriber fan-out.
    let subs = Arc::new(SubscriberSet::new(
        vec![Arc::new(LogWriter) as Arc<dyn Subscribe>],
        job.bus().clone(),
    ));
    let _listener = Arc::clone(&subs).listen(job.bus());

    let lifecycle = Lifecycle::new(job.clone(), job.bus().clone());
    lifecycle.start().await?;

    let token = CancellationToken::new();
    job.publish(&["one".to_string(), "two".to_string()], &token)
        .await?;

    for _ in 0..2 {
        if let Some(msg) = outputs.recv().await {
            println!("shard answered: {}", msg.value());
        }
    }

    // A restart spawns a fresh process; the channels survive.
    lifecycle.restart().await?;
    job.publish(&["three".to_string()], &token).await?;
    if let Some(msg) = outputs.recv().await {
        println!("shard answered after restart: {}", msg.value());
    }

    lifecycle.stop().await?;
    println!("runs: {}", lifecycle.run_count());
    Ok(())
}
