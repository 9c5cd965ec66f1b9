use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;
use mdensemble::backlog::TaskInput;
use mdensemble::engine::RuntimeEvent;
use mdensemble::errors::{MdEnsembleError, Result};
use mdensemble::exec::ExecutorGateway;
use mdensemble::record::CompletionRecord;
use mdensemble::types::TaskId;

/// How the fake gateway answers a submission.
#[derive(Debug, Clone, Default)]
pub enum FakeOutcome {
    /// Every task succeeds.
    #[default]
    AllSucceed,
    /// Every task fails.
    AllFail,
    /// Tasks with these ids fail, the rest succeed.
    FailIds(HashSet<TaskId>),
    /// Record the submission but never report a completion.
    Hold,
    /// Accept and complete the first `n` submissions, then reject every
    /// further one with `GatewayUnavailable`.
    UnavailableAfter(usize),
}

/// A fake gateway that:
/// - records which tasks were submitted, in order
/// - reports a completion for each submission from a separate Tokio task,
///   so the runtime is never blocked on its own event channel.
pub struct FakeGateway {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    outcome: FakeOutcome,
    submitted: Arc<Mutex<Vec<TaskId>>>,
    shut_down: Arc<AtomicBool>,
}

impl FakeGateway {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, outcome: FakeOutcome) -> Self {
        Self {
            runtime_tx,
            outcome,
            submitted: Arc::new(Mutex::new(Vec::new())),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle to the ids submitted so far.
    pub fn submitted(&self) -> Arc<Mutex<Vec<TaskId>>> {
        Arc::clone(&self.submitted)
    }

    /// Set once `shutdown` has been called.
    pub fn shut_down_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shut_down)
    }

    fn record_for(&self, task: &TaskInput, topic: String) -> Option<CompletionRecord> {
        match &self.outcome {
            FakeOutcome::AllSucceed => Some(CompletionRecord::success(task.id, topic)),
            FakeOutcome::AllFail => {
                Some(CompletionRecord::failure(task.id, topic, "simulated failure"))
            }
            FakeOutcome::FailIds(ids) if ids.contains(&task.id) => {
                Some(CompletionRecord::failure(task.id, topic, "simulated failure"))
            }
            FakeOutcome::FailIds(_) => Some(CompletionRecord::success(task.id, topic)),
            FakeOutcome::Hold => None,
            FakeOutcome::UnavailableAfter(_) => Some(CompletionRecord::success(task.id, topic)),
        }
    }
}

impl ExecutorGateway for FakeGateway {
    fn submit(
        &mut self,
        task: TaskInput,
        topic: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Rejected submissions are recorded too, so tests can see every attempt.
        let attempt = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(task.id);
            submitted.len()
        };

        if let FakeOutcome::UnavailableAfter(n) = self.outcome {
            if attempt > n {
                debug!(task_id = %task.id, attempt, "fake gateway rejecting submission");
                return Box::pin(async move {
                    Err(MdEnsembleError::GatewayUnavailable(format!(
                        "fake gateway down; rejected task {}",
                        task.id
                    )))
                });
            }
        }
        debug!(task_id = %task.id, attempt, "fake gateway accepted submission");

        let record = self
            .record_for(&task, topic)
            .map(|r| r.with_payload(fake_payload(&task)));
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            if let Some(record) = record {
                tokio::spawn(async move {
                    let _ = tx.send(RuntimeEvent::TaskCompleted(record)).await;
                });
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        debug!("fake gateway shut down");
        self.shut_down.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

// Distinctive enough that a leaked payload is easy to spot in the log.
fn fake_payload(task: &TaskInput) -> serde_json::Value {
    json!({
        "trajectory": format!("trajectory-bytes-for-{}", task.input_dir.display()),
        "frames": 5000,
    })
}
