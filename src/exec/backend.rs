// src/exec/backend.rs

//! Pluggable executor gateway abstraction.
//!
//! The runtime talks to an `ExecutorGateway` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake gateway in tests while keeping the
//! production implementation in [`executor_loop`](super::executor_loop).
//!
//! Contract every implementation must honour:
//! - `submit` takes ownership of the input and must not block indefinitely.
//! - Exactly one `RuntimeEvent::TaskCompleted` is delivered per submitted
//!   task, in any order, through the runtime's event channel.
//! - `shutdown` stops intake and waits for in-flight tasks; completions of
//!   tasks submitted before shutdown are still delivered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backlog::TaskInput;
use crate::engine::RuntimeEvent;
use crate::errors::{MdEnsembleError, Result};

use super::executor_loop::{spawn_executor, Submission};
use super::task_runner::WorkerSettings;

/// Trait abstracting how submitted tasks are executed.
///
/// Production code uses [`ProcessGateway`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorGateway: Send {
    /// Schedule one task for asynchronous execution under `topic`.
    fn submit(
        &mut self,
        task: TaskInput,
        topic: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// No more submissions will follow; drain in-flight work.
    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Gateway that runs each task as a local shell process.
///
/// Internally this wraps the executor loop from [`spawn_executor`]; `submit`
/// forwards the task over an mpsc channel to that loop.
pub struct ProcessGateway {
    tx: Option<mpsc::Sender<Submission>>,
    handle: Option<JoinHandle<()>>,
}

impl ProcessGateway {
    /// Create a new process gateway, wiring it to the given runtime event
    /// sender.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(settings: WorkerSettings, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        let (tx, handle) = spawn_executor(Arc::new(settings), runtime_tx);
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }
}

impl ExecutorGateway for ProcessGateway {
    fn submit(
        &mut self,
        task: TaskInput,
        topic: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            let tx = tx.ok_or_else(|| {
                MdEnsembleError::GatewayUnavailable("gateway has been shut down".to_string())
            })?;

            let task_id = task.id;
            tx.send(Submission {
                task,
                topic,
                submitted_at: Utc::now(),
            })
            .await
            .map_err(|_| {
                MdEnsembleError::GatewayUnavailable(format!(
                    "executor loop stopped; could not submit task {task_id}"
                ))
            })
        })
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Dropping the sender closes the intake; the loop then drains.
        self.tx = None;
        let handle = self.handle.take();

        Box::pin(async move {
            if let Some(handle) = handle {
                handle
                    .await
                    .map_err(|e| MdEnsembleError::Other(anyhow::Error::from(e)))?;
            }
            debug!("process gateway shut down");
            Ok(())
        })
    }
}

impl Drop for ProcessGateway {
    fn drop(&mut self) {
        // Reached without `shutdown` only when the run is abandoned; abort the
        // loop so its task processes are killed.
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
