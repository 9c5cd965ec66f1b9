// src/engine/event_handlers.rs

//! Transition helpers for the dispatch controller.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::backlog::{TaskBacklog, TaskInput};
use crate::engine::state::DispatchState;
use crate::errors::{MdEnsembleError, Result};
use crate::record::{CompletionRecord, ResultLogEntry};
use crate::types::TaskId;

/// Command produced by the pure core, to be executed by the outer IO shell
/// in the order given.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchCommand {
    /// Append this entry to the topic's result log.
    RecordResult { topic: String, entry: ResultLogEntry },
    /// Hand this input to the executor gateway.
    Submit { task: TaskInput, topic: String },
    /// The backlog is exhausted and every submitted task has completed.
    SignalDone,
}

/// Decision returned by the core after `start` or a completion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchStep {
    pub commands: Vec<DispatchCommand>,
    /// Whether the controller is done after this step.
    pub done: bool,
}

impl DispatchStep {
    /// Inputs submitted by this step, in submission order.
    pub fn submissions(&self) -> impl Iterator<Item = &TaskInput> {
        self.commands.iter().filter_map(|c| match c {
            DispatchCommand::Submit { task, .. } => Some(task),
            _ => None,
        })
    }
}

/// Take the next backlog entry into the window, if a slot is free and the
/// backlog is not exhausted.
///
/// Returns `true` if a task was admitted.
pub fn admit_next(
    state: &mut DispatchState,
    backlog: &mut TaskBacklog,
    in_flight: &mut HashMap<TaskId, PathBuf>,
    topic: &str,
    commands: &mut Vec<DispatchCommand>,
) -> bool {
    if !state.has_free_slot() {
        return false;
    }

    let Some(task) = backlog.take_next() else {
        return false;
    };

    state.submitted_count += 1;
    in_flight.insert(task.id, task.input_dir.clone());

    debug!(
        task_id = %task.id,
        input_dir = %task.input_dir.display(),
        in_flight = state.in_flight(),
        remaining = backlog.remaining(),
        "admitting task"
    );

    commands.push(DispatchCommand::Submit {
        task,
        topic: topic.to_string(),
    });
    true
}

/// Check a completion record against what the controller has in flight and
/// remove the task from the window.
///
/// Anything other than a well-formed record for an in-flight task of our
/// topic is a protocol violation: accepting it could double-count a slot,
/// dropping it would leak one.
pub fn resolve_record(
    record: &CompletionRecord,
    expected_topic: &str,
    in_flight: &mut HashMap<TaskId, PathBuf>,
    state: &DispatchState,
) -> Result<(TaskId, PathBuf)> {
    let task_id = record.task_id.ok_or_else(|| {
        MdEnsembleError::Protocol("completion record without a task identity".to_string())
    })?;

    match record.topic.as_deref() {
        None => {
            return Err(MdEnsembleError::Protocol(format!(
                "completion record for task {task_id} has no topic"
            )));
        }
        Some(topic) if topic != expected_topic => {
            return Err(MdEnsembleError::Protocol(format!(
                "completion record for task {task_id} has topic '{topic}', expected '{expected_topic}'"
            )));
        }
        Some(_) => {}
    }

    match in_flight.remove(&task_id) {
        Some(input_dir) => Ok((task_id, input_dir)),
        None if (task_id.0 as usize) < state.submitted_count => Err(MdEnsembleError::Protocol(
            format!("duplicate completion for already completed task {task_id}"),
        )),
        None => Err(MdEnsembleError::Protocol(format!(
            "completion for task {task_id}, which was never submitted"
        ))),
    }
}

/// Build the log entry for a resolved record.
pub fn record_result(
    task_id: TaskId,
    topic: &str,
    input_dir: PathBuf,
    record: CompletionRecord,
    commands: &mut Vec<DispatchCommand>,
) {
    let entry = ResultLogEntry::from_record(task_id, topic.to_string(), input_dir, record);
    commands.push(DispatchCommand::RecordResult {
        topic: topic.to_string(),
        entry,
    });
}

/// Fire the completion signal once everything is resolved.
///
/// Signalling is idempotent: once `done` is set, no further command is issued.
pub fn maybe_signal_done(state: &mut DispatchState, commands: &mut Vec<DispatchCommand>) {
    if state.done || !state.all_resolved() {
        return;
    }

    state.done = true;
    info!(
        completed = state.completed_count,
        failed = state.failed_count,
        "all tasks resolved; dispatch complete"
    );
    commands.push(DispatchCommand::SignalDone);
}
