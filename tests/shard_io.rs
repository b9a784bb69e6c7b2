//! End-to-end coverage over real worker processes (`sh`/`cat`).
//!
//! Each test drives a full spawn → pump → publish → teardown cycle and
//! asserts on the channel contents and runtime events, not on internals.

#![cfg(unix)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use shardvisor::{
    ChildWatcherSink, CodecError, Encode, Event, EventKind, JobConfig, Lifecycle, LifecycleError,
    LifecycleState, LineDecoder, LineEncoder, ParseLineDecoder, ProcessJob, ProcessSpec, JobError,
};

const TEST_WAIT: Duration = Duration::from_secs(10);

fn sh(script: &str) -> ProcessSpec {
    ProcessSpec::new("sh").arg("-c").arg(script)
}

/// String-in, string-out job over the given worker.
fn line_job(id: &str, spec: ProcessSpec, cfg: JobConfig) -> Arc<ProcessJob<String, String, String>> {
    Arc::new(
        ProcessJob::builder(
            id,
            spec,
            Arc::new(LineEncoder),
            Arc::new(LineDecoder),
            Arc::new(LineDecoder),
        )
        .with_config(cfg)
        .build(),
    )
}

fn lifecycle_for(job: &Arc<ProcessJob<String, String, String>>) -> Lifecycle {
    Lifecycle::new(job.clone(), job.bus().clone())
}

async fn recv_line(outputs: &mut shardvisor::Outputs<String>) -> String {
    timeout(TEST_WAIT, outputs.recv())
        .await
        .expect("timed out waiting for an output record")
        .expect("outputs channel closed")
        .into_value()
}

/// Collects events until `kind` shows up or the deadline passes.
async fn wait_for_event(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    kind: EventKind,
) -> Event {
    timeout(TEST_WAIT, async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind => return ev,
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    panic!("event bus closed before {kind:?}")
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind:?}"))
}

#[tokio::test]
async fn echo_roundtrip_preserves_order() {
    let job = line_job("echo", ProcessSpec::new("cat"), JobConfig::default());
    let mut outputs = job.take_outputs().unwrap();
    let mut errors = job.errors();
    let lc = lifecycle_for(&job);

    lc.start().await.unwrap();
    let token = CancellationToken::new();
    job.publish(
        &["a".to_string(), "b".to_string(), "c".to_string()],
        &token,
    )
    .await
    .unwrap();

    assert_eq!(recv_line(&mut outputs).await, "a");
    assert_eq!(recv_line(&mut outputs).await, "b");
    assert_eq!(recv_line(&mut outputs).await, "c");
    assert!(errors.try_recv().is_none());

    lc.stop().await.unwrap();
    assert_eq!(lc.state().await, LifecycleState::Stopped);
}

#[tokio::test]
async fn stop_drops_records_stuck_behind_a_hung_worker() {
    // The worker echoes the first line then wedges; the second input sits
    // in the pipe and must not surface after the stop.
    let script = r#"while read l; do
        if [ "$l" = hang ]; then echo hang; sleep 1000; else echo "$l"; fi
    done"#;
    let job = line_job("hang", sh(script), JobConfig::default());
    let mut outputs = job.take_outputs().unwrap();
    let lc = lifecycle_for(&job);

    lc.start().await.unwrap();
    let token = CancellationToken::new();
    job.publish(&["hang".to_string(), "test".to_string()], &token)
        .await
        .unwrap();

    assert_eq!(recv_line(&mut outputs).await, "hang");
    lc.stop().await.unwrap();

    assert!(outputs.try_recv().is_none());
}

#[tokio::test]
async fn restart_redelivers_through_a_fresh_worker() {
    let script = r#"while read l; do
        if [ "$l" = hang ]; then echo hang; sleep 1000; else echo "$l"; fi
    done"#;
    let job = line_job("hang-restart", sh(script), JobConfig::default());
    let mut outputs = job.take_outputs().unwrap();
    let lc = lifecycle_for(&job);

    lc.start().await.unwrap();
    let token = CancellationToken::new();
    job.publish(&["hang".to_string()], &token).await.unwrap();
    assert_eq!(recv_line(&mut outputs).await, "hang");

    // Fresh process; channels survive across runs.
    lc.restart().await.unwrap();
    assert_eq!(lc.run_count(), 2);
    job.publish(&["test".to_string()], &token).await.unwrap();
    assert_eq!(recv_line(&mut outputs).await, "test");

    lc.stop().await.unwrap();
}

#[tokio::test]
async fn start_is_idempotent_against_a_live_worker() {
    let job = line_job("idempotent", sh("read l"), JobConfig::default());
    let lc = lifecycle_for(&job);

    lc.start().await.unwrap();
    lc.start().await.unwrap();
    lc.start().await.unwrap();
    assert_eq!(lc.run_count(), 1);

    assert!(lc.try_stop().await.unwrap());
    assert!(!lc.try_stop().await.unwrap());
    assert!(matches!(
        lc.stop().await.unwrap_err(),
        LifecycleError::NotRunning
    ));
}

#[tokio::test]
async fn second_run_on_same_job_is_rejected() {
    let job = line_job("single-run", sh("sleep 1000"), JobConfig::default());
    let first_token = CancellationToken::new();

    let runner = {
        let job = job.clone();
        let token = first_token.clone();
        tokio::spawn(async move { job.run(token).await })
    };
    // Let the first run take the gate and spawn.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = job.run(CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.as_label(), "job_already_running");

    first_token.cancel();
    timeout(TEST_WAIT, runner).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn errors_channel_evicts_oldest_under_flood() {
    let script = r#"i=0
    while [ $i -lt 20 ]; do echo "err$i" 1>&2; i=$((i+1)); done
    sleep 1000"#;
    let mut cfg = JobConfig::default();
    cfg.errors_capacity = 4;
    let job = line_job("stderr-flood", sh(script), cfg);
    // Subscribe before the worker starts so no record predates the reader.
    let mut errors = job.errors();
    let lc = lifecycle_for(&job);

    lc.start().await.unwrap();
    // Let the whole flood land before reading: forces eviction.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut got = Vec::new();
    while let Some(msg) = errors.try_recv() {
        got.push(msg.into_value());
    }
    assert_eq!(got, vec!["err16", "err17", "err18", "err19"]);
    assert_eq!(errors.evicted(), 16);

    lc.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_records_are_isolated_not_fatal() {
    let job: Arc<ProcessJob<String, i64, String>> = Arc::new(
        ProcessJob::builder(
            "parse",
            sh("echo 1; echo x; echo 2; sleep 1000"),
            Arc::new(LineEncoder),
            Arc::new(ParseLineDecoder::<i64>::new()),
            Arc::new(LineDecoder),
        )
        .build(),
    );
    let mut outputs = job.take_outputs().unwrap();
    let mut events = job.subscribe_events();
    let lc = Lifecycle::new(job.clone(), job.bus().clone());

    lc.start().await.unwrap();

    let first = timeout(TEST_WAIT, outputs.recv()).await.unwrap().unwrap();
    assert_eq!(*first.value(), 1);
    let second = timeout(TEST_WAIT, outputs.recv()).await.unwrap().unwrap();
    assert_eq!(*second.value(), 2);

    let failed = wait_for_event(&mut events, EventKind::DecodeFailed).await;
    assert_eq!(failed.shard.as_deref(), Some("parse"));
    assert!(failed.reason.is_some());

    lc.stop().await.unwrap();
}

#[tokio::test]
async fn worker_fault_surfaces_on_next_start() {
    let job = line_job("faulty", sh("read l; exit 3"), JobConfig::default());
    let mut events = job.subscribe_events();
    let lc = lifecycle_for(&job);

    lc.start().await.unwrap();
    let token = CancellationToken::new();
    job.publish(&["go".to_string()], &token).await.unwrap();

    // Wait for the background run to observe the failure exit.
    wait_for_event(&mut events, EventKind::ProcessExited).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = timeout(TEST_WAIT, lc.start()).await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Job(JobError::ExitedWithFailure { code: Some(3), .. })
    ));

    // Observed once; recovery is a plain start.
    lc.start().await.unwrap();
    lc.stop().await.unwrap();
}

#[tokio::test]
async fn clean_natural_exit_is_ok_with_unexpected_stop_event() {
    let job = line_job("one-shot", sh("echo done"), JobConfig::default());
    let mut outputs = job.take_outputs().unwrap();
    let mut events = job.subscribe_events();

    let res = timeout(TEST_WAIT, job.run(CancellationToken::new()))
        .await
        .unwrap();
    assert!(res.is_ok());
    assert_eq!(recv_line(&mut outputs).await, "done");
    wait_for_event(&mut events, EventKind::UnexpectedStop).await;
}

#[tokio::test]
async fn cancelled_run_swallows_failure_exit_code() {
    // `sleep` dies from SIGKILL on teardown: a failure status, but the
    // cancellation wins.
    let job = line_job("cancelled", sh("sleep 1000"), JobConfig::default());
    let mut events = job.subscribe_events();
    let token = CancellationToken::new();

    let runner = {
        let job = job.clone();
        let token = token.clone();
        tokio::spawn(async move { job.run(token).await })
    };
    wait_for_event(&mut events, EventKind::ProcessReady).await;

    token.cancel();
    let res = timeout(TEST_WAIT, runner).await.unwrap().unwrap();
    assert!(res.is_ok());
    wait_for_event(&mut events, EventKind::ExitAfterCancel).await;
}

#[tokio::test]
async fn publish_after_worker_death_reports_crash_or_unavailable() {
    let job = line_job("dead-worker", sh("exit 7"), JobConfig::default());
    let mut events = job.subscribe_events();
    let lc = lifecycle_for(&job);

    lc.start().await.unwrap();
    wait_for_event(&mut events, EventKind::ProcessExited).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The wait for a publishable process never succeeds now; bound it
    // with a pre-cancelled deadline token.
    let deadline = CancellationToken::new();
    deadline.cancel();
    let err = job.publish(&["late".to_string()], &deadline).await.unwrap_err();
    assert!(matches!(
        err,
        JobError::PublishUnavailable { last_exit: Some(7), .. }
    ));

    let stop = lc.stop().await;
    // The fault from the dead run surfaces here if not yet harvested.
    if let Err(e) = stop {
        assert!(matches!(
            e,
            LifecycleError::Job(JobError::ExitedWithFailure { code: Some(7), .. })
        ));
    }
}

#[tokio::test]
async fn readiness_probe_gates_publish_and_watcher_sees_pid() {
    let (pid_tx, mut pid_rx) = tokio::sync::mpsc::unbounded_channel();
    let gate = Arc::new(AtomicBool::new(false));
    let probe_gate = gate.clone();

    let mut cfg = JobConfig::default();
    cfg.status_check_interval = Duration::from_millis(10);
    let job: Arc<ProcessJob<String, String, String>> = Arc::new(
        ProcessJob::builder(
            "gated",
            ProcessSpec::new("cat"),
            Arc::new(LineEncoder),
            Arc::new(LineDecoder),
            Arc::new(LineDecoder),
        )
        .with_config(cfg)
        .with_probe(Arc::new(move |_pid: u32| probe_gate.load(Ordering::SeqCst)))
        .with_watcher(ChildWatcherSink::from_sender(pid_tx))
        .build(),
    );
    let mut outputs = job.take_outputs().unwrap();
    let lc = lifecycle_for(&job);
    lc.start().await.unwrap();

    // The spawned pid reaches the watchdog side of the sink.
    let pid = timeout(TEST_WAIT, pid_rx.recv()).await.unwrap().unwrap();
    assert!(pid > 0);

    // While the probe denies, the worker never counts as ready and a
    // publish stays parked on the readiness wait.
    assert!(!job.is_ready());
    let publish = {
        let job = job.clone();
        tokio::spawn(async move {
            job.publish(&["ping".to_string()], &CancellationToken::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!publish.is_finished());

    gate.store(true, Ordering::SeqCst);
    timeout(TEST_WAIT, publish).await.unwrap().unwrap().unwrap();
    assert_eq!(recv_line(&mut outputs).await, "ping");
    assert!(job.is_ready());

    lc.stop().await.unwrap();
}

#[tokio::test]
async fn graceful_window_lets_worker_exit_without_kill() {
    let mut cfg = JobConfig::default();
    cfg.graceful_stop = Duration::from_secs(5);
    let job = line_job("graceful", sh("sleep 1"), cfg);
    let mut events = job.subscribe_events();
    let token = CancellationToken::new();

    let runner = {
        let job = job.clone();
        let token = token.clone();
        tokio::spawn(async move { job.run(token).await })
    };
    wait_for_event(&mut events, EventKind::ProcessReady).await;
    token.cancel();

    let res = timeout(TEST_WAIT, runner).await.unwrap().unwrap();
    assert!(res.is_ok());

    // The worker finished on its own inside the grace window: exit code 0,
    // not the signal kill a zero-grace teardown would have produced.
    let exited = wait_for_event(&mut events, EventKind::ProcessExited).await;
    assert_eq!(exited.code, Some(0));
}

/// Line encoder that holds the publish open after the write lands, so a
/// worker crash triggered by the batch becomes visible to the publisher.
struct SlowAckEncoder {
    linger: Duration,
}

#[async_trait]
impl Encode<String> for SlowAckEncoder {
    async fn write_batch(
        &self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        batch: &[String],
    ) -> Result<(), CodecError> {
        LineEncoder.write_batch(writer, batch).await?;
        tokio::time::sleep(self.linger).await;
        Ok(())
    }
}

#[tokio::test]
async fn publish_that_lands_before_a_crash_reports_published_but_crashed() {
    let job: Arc<ProcessJob<String, String, String>> = Arc::new(
        ProcessJob::builder(
            "crash-after-write",
            sh("read l; exit 5"),
            Arc::new(SlowAckEncoder {
                linger: Duration::from_millis(500),
            }),
            Arc::new(LineDecoder),
            Arc::new(LineDecoder),
        )
        .build(),
    );
    let mut events = job.subscribe_events();
    let token = CancellationToken::new();

    let runner = {
        let job = job.clone();
        let token = token.clone();
        tokio::spawn(async move { job.run(token).await })
    };
    wait_for_event(&mut events, EventKind::ProcessReady).await;

    // The batch itself makes the worker exit nonzero; the lingering ack
    // keeps the publish in flight until that exit is visible.
    let err = timeout(TEST_WAIT, job.publish(&["go".to_string()], &token))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        err,
        JobError::PublishedButCrashed { code: Some(5), .. }
    ));

    let res = timeout(TEST_WAIT, runner).await.unwrap().unwrap();
    assert!(matches!(
        res,
        Err(JobError::ExitedWithFailure { code: Some(5), .. })
    ));
}
