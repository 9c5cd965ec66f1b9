// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{MdEnsembleError, Result};
use crate::exec::ExecutorGateway;
use crate::result_log::ResultLog;

use super::core::DispatchController;
use super::{DispatchCommand, DispatchStep, RuntimeEvent};

/// What a finished run looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    /// The run stopped on a shutdown request before all tasks resolved.
    pub interrupted: bool,
}

/// Drives the dispatch controller in response to `RuntimeEvent`s,
/// and delegates task execution to an `ExecutorGateway`.
///
/// This is a pure IO shell around `DispatchController`. It drains the single
/// inbound event channel one event at a time, so every controller step and
/// the commands it produces run to completion before the next completion is
/// looked at.
pub struct Runtime<G: ExecutorGateway> {
    controller: DispatchController,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    gateway: G,
    result_log: ResultLog,
}

impl<G: ExecutorGateway> fmt::Debug for Runtime<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("controller", &self.controller)
            .field("result_log", &self.result_log)
            .finish_non_exhaustive()
    }
}

impl<G: ExecutorGateway> Runtime<G> {
    pub fn new(
        controller: DispatchController,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        gateway: G,
        result_log: ResultLog,
    ) -> Self {
        Self {
            controller,
            event_rx,
            gateway,
            result_log,
        }
    }

    /// Main event loop.
    ///
    /// - Fills the window.
    /// - Feeds completion events into the controller.
    /// - Executes the commands it returns (log, submit, done).
    /// - Once done, shuts the gateway down and flushes the log.
    ///
    /// Protocol violations and gateway failures end the run with an error.
    /// A shutdown request ends it early without draining in-flight work.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!(topic = %self.controller.topic(), "mdensemble runtime started");

        let step = self.controller.start()?;
        self.execute_step(step).await?;

        let mut interrupted = false;

        while !self.controller.is_done() {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    let state = self.controller.state();
                    return Err(MdEnsembleError::GatewayUnavailable(format!(
                        "completion channel closed with {} task(s) still in flight",
                        state.in_flight()
                    )));
                }
            };

            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::TaskCompleted(record) => {
                    let step = self.controller.on_completion(record)?;
                    self.execute_step(step).await?;
                }
                RuntimeEvent::ShutdownRequested => {
                    warn!(
                        in_flight = self.controller.state().in_flight(),
                        "shutdown requested; abandoning in-flight tasks"
                    );
                    interrupted = true;
                    break;
                }
            }
        }

        self.result_log.flush()?;

        if !interrupted {
            info!("dispatch complete; shutting down executor gateway");
            self.gateway.shutdown().await?;
        }

        let state = self.controller.state();
        let summary = RunSummary {
            submitted: state.submitted_count,
            completed: state.completed_count,
            failed: state.failed_count,
            interrupted,
        };

        info!(?summary, "runtime exiting");
        Ok(summary)
    }

    async fn execute_step(&mut self, step: DispatchStep) -> Result<()> {
        for command in step.commands {
            self.execute_command(command).await?;
        }
        Ok(())
    }

    /// Execute a single command from the controller.
    async fn execute_command(&mut self, command: DispatchCommand) -> Result<()> {
        match command {
            DispatchCommand::RecordResult { topic, entry } => {
                self.result_log.append(&topic, &entry)?;
            }
            DispatchCommand::Submit { task, topic } => {
                debug!(task_id = %task.id, "submitting task to gateway");
                self.gateway.submit(task, topic).await?;
            }
            DispatchCommand::SignalDone => {
                info!("controller signalled completion");
            }
        }
        Ok(())
    }
}
