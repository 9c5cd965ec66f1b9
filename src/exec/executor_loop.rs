// src/exec/executor_loop.rs

//! Main executor loop that runs submitted tasks as worker processes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::backlog::TaskInput;
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::{run_attempt, WorkerSettings};
use crate::record::{CompletionRecord, TaskTiming};
use crate::types::TaskId;

/// Capacity of the submission queue between the runtime and the loop.
const SUBMISSION_QUEUE_CAPACITY: usize = 64;

/// A task handed to the executor loop.
#[derive(Debug, Clone)]
pub struct Submission {
    pub task: TaskInput,
    pub topic: String,
    pub submitted_at: DateTime<Utc>,
}

/// Free list of accelerator ids; each running task holds exactly one.
#[derive(Debug)]
struct AcceleratorPool {
    free: Mutex<Vec<String>>,
}

impl AcceleratorPool {
    fn new(mut ids: Vec<String>) -> Self {
        // Hand out ids in configuration order.
        ids.reverse();
        Self {
            free: Mutex::new(ids),
        }
    }

    fn lease(self: &Arc<Self>) -> Option<AcceleratorLease> {
        let id = self.free.lock().ok()?.pop()?;
        Some(AcceleratorLease {
            id,
            pool: Arc::clone(self),
        })
    }
}

/// Returns its id to the pool on drop.
#[derive(Debug)]
struct AcceleratorLease {
    id: String,
    pool: Arc<AcceleratorPool>,
}

impl Drop for AcceleratorLease {
    fn drop(&mut self) {
        if let Ok(mut free) = self.pool.free.lock() {
            free.push(std::mem::take(&mut self.id));
        }
    }
}

/// What became of a reaped task runner.
#[derive(Debug)]
pub enum Reaped {
    /// The runner returned; it delivered its own completion.
    Finished(TaskId),
    /// The runner panicked or was cancelled before reporting. The record
    /// stands in for the completion it never sent.
    Abnormal(CompletionRecord),
}

/// Task runners in flight, keyed back to the task each one serves.
#[derive(Debug, Default)]
pub struct RunningTasks {
    set: JoinSet<()>,
    owners: HashMap<Id, (TaskId, String)>,
}

impl RunningTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn spawn<F>(&mut self, task_id: TaskId, topic: String, runner: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.set.spawn(runner);
        self.owners.insert(handle.id(), (task_id, topic));
    }

    /// Wait for the next runner to end. `None` once nothing is running.
    pub async fn join_next(&mut self) -> Option<Reaped> {
        let joined = self.set.join_next_with_id().await?;
        Some(self.reap(joined))
    }

    fn reap(&mut self, joined: Result<(Id, ()), JoinError>) -> Reaped {
        match joined {
            // Every spawn registers its owner; the sentinel id only shows up
            // if that bookkeeping is broken, and the runtime rejects it.
            Ok((id, ())) => {
                let task_id = self.owners.remove(&id).map(|(task_id, _)| task_id);
                Reaped::Finished(task_id.unwrap_or(TaskId(u64::MAX)))
            }
            Err(e) => {
                let (task_id, topic) = self
                    .owners
                    .remove(&e.id())
                    .unwrap_or((TaskId(u64::MAX), String::new()));
                error!(task_id = %task_id, error = %e, "task runner ended abnormally");
                Reaped::Abnormal(CompletionRecord::failure(
                    task_id,
                    topic,
                    format!("task runner ended abnormally: {e}"),
                ))
            }
        }
    }
}

/// Spawn the background executor loop.
///
/// The returned sender is what [`ProcessGateway`](super::ProcessGateway)
/// submits into. The loop only receives submissions and spawns one Tokio task
/// per submission, so the intake never waits on a running task and a
/// submitter can't deadlock against completion delivery:
///
/// - at most `max_workers` task processes run at once (semaphore)
/// - each running task leases one accelerator id, if the platform has any
/// - a failed attempt is retried up to `retries` times before it is reported
/// - a runner that dies without reporting gets a failure record sent for it
///
/// When the sender is dropped the loop stops accepting work and waits for
/// every spawned task, so no completion is lost on shutdown.
pub fn spawn_executor(
    settings: Arc<WorkerSettings>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> (mpsc::Sender<Submission>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Submission>(SUBMISSION_QUEUE_CAPACITY);

    let handle = tokio::spawn(async move {
        let ctx = &settings.context;
        info!(
            label = %ctx.label,
            max_workers = ctx.max_workers,
            accelerators = ctx.accelerators.len(),
            retries = ctx.retries,
            "executor loop started"
        );

        let slots = Arc::new(Semaphore::new(ctx.max_workers.max(1)));
        let accelerators = Arc::new(AcceleratorPool::new(ctx.accelerators.clone()));
        let mut running = RunningTasks::new();

        loop {
            tokio::select! {
                submission = rx.recv() => {
                    let Some(submission) = submission else {
                        break;
                    };
                    debug!(
                        task_id = %submission.task.id,
                        topic = %submission.topic,
                        "executor accepted submission"
                    );
                    let (task_id, topic) = (submission.task.id, submission.topic.clone());
                    running.spawn(task_id, topic, run_submission(
                        submission,
                        Arc::clone(&settings),
                        Arc::clone(&slots),
                        Arc::clone(&accelerators),
                        runtime_tx.clone(),
                    ));
                }
                Some(reaped) = running.join_next(), if !running.is_empty() => {
                    deliver_reaped(reaped, &runtime_tx);
                }
            }
        }

        info!(in_flight = running.len(), "executor intake closed; draining");
        while let Some(reaped) = running.join_next().await {
            deliver_reaped(reaped, &runtime_tx);
        }

        info!("executor loop finished (channel closed)");
    });

    (tx, handle)
}

// Sent from its own task: the runtime may be blocked submitting into this
// loop's intake.
fn deliver_reaped(reaped: Reaped, runtime_tx: &mpsc::Sender<RuntimeEvent>) {
    if let Reaped::Abnormal(record) = reaped {
        let tx = runtime_tx.clone();
        tokio::spawn(async move {
            if tx.send(RuntimeEvent::TaskCompleted(record)).await.is_err() {
                debug!("runtime gone; dropping stand-in completion");
            }
        });
    }
}

/// Run one submission to a terminal outcome and report it.
async fn run_submission(
    submission: Submission,
    settings: Arc<WorkerSettings>,
    slots: Arc<Semaphore>,
    accelerators: Arc<AcceleratorPool>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let Submission {
        task,
        topic,
        submitted_at,
    } = submission;

    // The semaphore is never closed, so acquisition only fails if the loop
    // itself is being torn down.
    let _permit = match slots.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return,
    };
    let lease = accelerators.lease();
    let accelerator = lease.as_ref().map(|l| l.id.as_str());

    let mut timing = TaskTiming {
        submitted_at: Some(submitted_at),
        started_at: Some(Utc::now()),
        ..TaskTiming::default()
    };

    let max_attempts = settings.context.retries + 1;
    let mut attempts = 0;
    let mut last_error: Option<String> = None;
    let mut payload: Option<serde_json::Value> = None;

    while attempts < max_attempts {
        attempts += 1;
        match run_attempt(&task, &settings, accelerator).await {
            Ok(outcome) => {
                payload = Some(json!({
                    "workdir": outcome.workdir,
                    "exit_code": outcome.exit_code,
                    "accelerator": accelerator,
                }));
                if outcome.success() {
                    last_error = None;
                    break;
                }
                last_error = Some(format!("task process exited with code {}", outcome.exit_code));
            }
            Err(err) => {
                last_error = Some(format!("{err:#}"));
            }
        }

        if attempts < max_attempts {
            warn!(
                task_id = %task.id,
                attempt = attempts,
                max_attempts,
                error = last_error.as_deref().unwrap_or_default(),
                "task attempt failed; retrying"
            );
        }
    }

    timing.finish(Utc::now());
    drop(lease);

    let mut record = match last_error {
        None => CompletionRecord::success(task.id, topic),
        Some(error) => CompletionRecord::failure(task.id, topic, error),
    }
    .with_attempts(attempts)
    .with_timing(timing);
    if let Some(payload) = payload {
        record = record.with_payload(payload);
    }

    info!(
        task_id = %task.id,
        success = record.success,
        attempts,
        runtime_secs = ?record.timing.runtime_secs,
        "task finished"
    );

    if runtime_tx.send(RuntimeEvent::TaskCompleted(record)).await.is_err() {
        debug!(task_id = %task.id, "runtime gone; dropping completion");
    }
}
