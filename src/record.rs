// src/record.rs

//! Completion records (what the gateway reports for a finished task) and the
//! sanitized entries persisted to the result log.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::TaskId;

/// Timestamps collected by the gateway over the life of one task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskTiming {
    /// When the gateway accepted the submission.
    pub submitted_at: Option<DateTime<Utc>>,
    /// When a worker slot picked the task up.
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall time from `started_at` to `finished_at`, across all attempts.
    pub runtime_secs: Option<f64>,
}

impl TaskTiming {
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
        if let Some(started) = self.started_at {
            let elapsed = at.signed_duration_since(started);
            self.runtime_secs = Some(elapsed.num_milliseconds() as f64 / 1000.0);
        }
    }
}

/// Terminal outcome of one submitted task.
///
/// `task_id` and `topic` are optional so that a malformed record coming back
/// from a gateway can be represented and rejected instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: Option<TaskId>,
    pub topic: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    /// Arbitrary task output. Never persisted to the result log.
    pub payload: Option<serde_json::Value>,
    pub attempts: u32,
    pub timing: TaskTiming,
}

impl CompletionRecord {
    pub fn success(task_id: TaskId, topic: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id),
            topic: Some(topic.into()),
            success: true,
            error: None,
            payload: None,
            attempts: 1,
            timing: TaskTiming::default(),
        }
    }

    pub fn failure(task_id: TaskId, topic: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success(task_id, topic)
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_timing(mut self, timing: TaskTiming) -> Self {
        self.timing = timing;
        self
    }
}

/// One line of a topic's result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultLogEntry {
    pub task_id: TaskId,
    pub topic: String,
    pub input_dir: PathBuf,
    pub success: bool,
    pub error: Option<String>,
    pub attempts: u32,
    pub timing: TaskTiming,
    pub logged_at: DateTime<Utc>,
}

impl ResultLogEntry {
    /// Strip the payload from a validated record and attach the task's input.
    pub fn from_record(
        task_id: TaskId,
        topic: String,
        input_dir: PathBuf,
        record: CompletionRecord,
    ) -> Self {
        Self {
            task_id,
            topic,
            input_dir,
            success: record.success,
            error: record.error,
            attempts: record.attempts,
            timing: record.timing,
            logged_at: Utc::now(),
        }
    }
}
