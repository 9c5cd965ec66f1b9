#![allow(dead_code)]

use mdensemble::engine::{DispatchCommand, DispatchConfig, DispatchController, DispatchStep};
use mdensemble::record::CompletionRecord;
use mdensemble::types::TaskId;
use mdensemble_test_utils::builders::backlog_of;

pub const TOPIC: &str = "task";

pub fn controller(backlog_size: usize, window_size: usize) -> DispatchController {
    DispatchController::new(
        DispatchConfig {
            window_size,
            topic: TOPIC.to_string(),
        },
        backlog_of(backlog_size),
    )
    .expect("valid controller")
}

pub fn submitted_ids(step: &DispatchStep) -> Vec<u64> {
    step.submissions().map(|t| t.id.0).collect()
}

pub fn logged_ids(step: &DispatchStep) -> Vec<u64> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            DispatchCommand::RecordResult { entry, .. } => Some(entry.task_id.0),
            _ => None,
        })
        .collect()
}

pub fn signals_done(step: &DispatchStep) -> bool {
    step.commands
        .iter()
        .any(|c| matches!(c, DispatchCommand::SignalDone))
}

pub fn ok(id: u64) -> CompletionRecord {
    CompletionRecord::success(TaskId(id), TOPIC)
}

pub fn failed(id: u64) -> CompletionRecord {
    CompletionRecord::failure(TaskId(id), TOPIC, "simulation blew up")
}
