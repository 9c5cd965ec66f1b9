// tests/runtime_fake_gateway.rs

mod common;

use common::controller;

use std::collections::HashSet;
use std::error::Error;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use mdensemble::engine::{Runtime, RuntimeEvent};
use mdensemble::errors::MdEnsembleError;
use mdensemble::result_log::{read_entries, ResultLog};
use mdensemble::types::TaskId;
use mdensemble_test_utils::fake_gateway::{FakeGateway, FakeOutcome};
use mdensemble_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn runtime_with_fake_gateway_processes_whole_backlog() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let gateway = FakeGateway::new(rt_tx.clone(), FakeOutcome::AllSucceed);
    let submitted = gateway.submitted();
    let shut_down = gateway.shut_down_flag();
    drop(rt_tx);

    let log = ResultLog::open(dir.path().join("result"))?;
    let runtime = Runtime::new(controller(10, 4), rt_rx, gateway, log);

    let summary = match timeout(Duration::from_secs(3), runtime.run()).await {
        Ok(result) => result?,
        Err(_) => panic!("runtime did not finish within 3 seconds"),
    };

    assert_eq!(summary.submitted, 10);
    assert_eq!(summary.completed, 10);
    assert_eq!(summary.failed, 0);
    assert!(!summary.interrupted);
    assert!(shut_down.load(Ordering::SeqCst));

    // Backlog order is submission order.
    let ids: Vec<u64> = submitted.lock().unwrap().iter().map(|id| id.0).collect();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());

    let entries = read_entries(dir.path().join("result").join("task.json"))?;
    assert_eq!(entries.len(), 10);
    let logged: HashSet<TaskId> = entries.iter().map(|e| e.task_id).collect();
    assert_eq!(logged.len(), 10);
    assert!(entries.iter().all(|e| e.success));

    Ok(())
}

#[tokio::test]
async fn failed_tasks_are_logged_and_the_run_still_completes() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let failing: HashSet<TaskId> = [TaskId(1), TaskId(3)].into_iter().collect();
    let gateway = FakeGateway::new(rt_tx, FakeOutcome::FailIds(failing));

    let log = ResultLog::open(dir.path())?;
    let runtime = Runtime::new(controller(5, 2), rt_rx, gateway, log);
    let summary = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.failed, 2);

    let entries = read_entries(dir.path().join("task.json"))?;
    let mut failed: Vec<u64> = entries
        .iter()
        .filter(|e| !e.success)
        .map(|e| e.task_id.0)
        .collect();
    failed.sort();
    assert_eq!(failed, vec![1, 3]);

    // Payloads never reach the log.
    let raw = std::fs::read_to_string(dir.path().join("task.json"))?;
    assert!(!raw.contains("trajectory-bytes"));

    Ok(())
}

#[tokio::test]
async fn empty_backlog_finishes_without_submitting() -> TestResult {
    let dir = tempfile::tempdir()?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(4);
    let gateway = FakeGateway::new(rt_tx, FakeOutcome::AllSucceed);
    let submitted = gateway.submitted();

    let log = ResultLog::open(dir.path())?;
    let summary = Runtime::new(controller(0, 4), rt_rx, gateway, log)
        .run()
        .await?;

    assert_eq!(summary.submitted, 0);
    assert!(submitted.lock().unwrap().is_empty());
    assert!(!dir.path().join("task.json").exists());
    Ok(())
}

#[tokio::test]
async fn shutdown_request_stops_the_run_without_draining() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(4);
    let gateway = FakeGateway::new(rt_tx.clone(), FakeOutcome::Hold);
    let shut_down = gateway.shut_down_flag();

    let log = ResultLog::open(dir.path())?;
    let runtime = Runtime::new(controller(6, 3), rt_rx, gateway, log);
    let handle = tokio::spawn(runtime.run());

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    let summary = timeout(Duration::from_secs(3), handle).await???;

    assert!(summary.interrupted);
    assert_eq!(summary.submitted, 3);
    assert_eq!(summary.completed, 0);
    assert!(!shut_down.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn closed_event_channel_is_reported_as_gateway_failure() -> TestResult {
    let dir = tempfile::tempdir()?;

    // The gateway reports on a different channel, so the runtime's own
    // channel has no senders left.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(4);
    let (other_tx, _other_rx) = mpsc::channel::<RuntimeEvent>(4);
    let gateway = FakeGateway::new(other_tx, FakeOutcome::AllSucceed);
    drop(rt_tx);

    let log = ResultLog::open(dir.path())?;
    let result = Runtime::new(controller(2, 1), rt_rx, gateway, log)
        .run()
        .await;

    assert!(matches!(result, Err(MdEnsembleError::GatewayUnavailable(_))));
    Ok(())
}

#[tokio::test]
async fn refill_submit_failure_ends_the_run_with_gateway_error() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(4);
    // The two window-filling submissions go through; the refill is rejected.
    let gateway = FakeGateway::new(rt_tx, FakeOutcome::UnavailableAfter(2));
    let submitted = gateway.submitted();
    let shut_down = gateway.shut_down_flag();

    let log = ResultLog::open(dir.path())?;
    let result = timeout(
        Duration::from_secs(3),
        Runtime::new(controller(3, 2), rt_rx, gateway, log).run(),
    )
    .await?;

    assert!(matches!(result, Err(MdEnsembleError::GatewayUnavailable(_))));
    assert!(!shut_down.load(Ordering::SeqCst));

    // Task 2 was offered exactly once; the controller does not resubmit it.
    let ids: Vec<u64> = submitted.lock().unwrap().iter().map(|id| id.0).collect();
    assert_eq!(ids, vec![0, 1, 2]);

    // The completion that triggered the refill was logged before it failed.
    let entries = read_entries(dir.path().join("task.json"))?;
    assert_eq!(entries.len(), 1);
    Ok(())
}

#[tokio::test]
async fn start_submit_failure_ends_the_run_with_gateway_error() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(4);
    let gateway = FakeGateway::new(rt_tx, FakeOutcome::UnavailableAfter(0));
    let submitted = gateway.submitted();
    let shut_down = gateway.shut_down_flag();

    let log = ResultLog::open(dir.path())?;
    let result = timeout(
        Duration::from_secs(3),
        Runtime::new(controller(3, 2), rt_rx, gateway, log).run(),
    )
    .await?;

    assert!(matches!(result, Err(MdEnsembleError::GatewayUnavailable(_))));
    assert!(!shut_down.load(Ordering::SeqCst));

    // The first rejection stops the window fill.
    assert_eq!(*submitted.lock().unwrap(), vec![TaskId(0)]);
    assert!(!dir.path().join("task.json").exists());
    Ok(())
}
