// src/engine/core.rs

//! Pure dispatch controller.
//!
//! A synchronous, deterministic state machine that keeps at most
//! `window_size` tasks in flight out of a finite backlog. It consumes
//! completion records and produces [`DispatchCommand`]s; the async shell
//! (`engine::runtime::Runtime`) is responsible for:
//! - reading completion events from the gateway channel
//! - appending log entries and submitting tasks to the gateway
//! - shutting the gateway down once the controller is done
//!
//! The controller has no channels, no Tokio types and performs no IO, so it
//! can be driven directly from tests or from any other event loop. Calls take
//! `&mut self`, which makes `start` and `on_completion` mutually exclusive.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::backlog::TaskBacklog;
use crate::engine::event_handlers::{
    admit_next, maybe_signal_done, record_result, resolve_record, DispatchStep,
};
use crate::engine::state::DispatchState;
use crate::errors::{MdEnsembleError, Result};
use crate::record::CompletionRecord;
use crate::types::TaskId;

/// Settings the controller needs at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum number of tasks in flight.
    pub window_size: usize,
    /// Topic every task is submitted under.
    pub topic: String,
}

#[derive(Debug)]
pub struct DispatchController {
    config: DispatchConfig,
    backlog: TaskBacklog,
    /// Input directory of every in-flight task, keyed by task id.
    in_flight: HashMap<TaskId, PathBuf>,
    state: DispatchState,
    started: bool,
}

impl DispatchController {
    /// Create a controller over `backlog`.
    ///
    /// A zero window with work in the backlog could never make progress and
    /// is rejected here instead of hanging at runtime.
    pub fn new(config: DispatchConfig, backlog: TaskBacklog) -> Result<Self> {
        if config.window_size == 0 && backlog.total() > 0 {
            return Err(MdEnsembleError::ConfigError(format!(
                "window size must be >= 1 to process {} backlog entries (got 0)",
                backlog.total()
            )));
        }
        if config.topic.trim().is_empty() {
            return Err(MdEnsembleError::ConfigError(
                "dispatch topic must not be empty".to_string(),
            ));
        }

        let state = DispatchState::new(config.window_size, backlog.total());
        Ok(Self {
            config,
            backlog,
            in_flight: HashMap::new(),
            state,
            started: false,
        })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Inputs not yet submitted.
    pub fn backlog(&self) -> &TaskBacklog {
        &self.backlog
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Whether the completion signal has fired. Pure read.
    pub fn is_done(&self) -> bool {
        self.state.done
    }

    /// Fill the window from the backlog.
    ///
    /// Submits `min(window_size, backlog)` tasks; with an empty backlog the
    /// completion signal fires immediately.
    pub fn start(&mut self) -> Result<DispatchStep> {
        if self.started {
            return Err(MdEnsembleError::Protocol(
                "dispatch controller started twice".to_string(),
            ));
        }
        self.started = true;

        info!(
            backlog = self.backlog.total(),
            window_size = self.config.window_size,
            topic = %self.config.topic,
            "starting dispatch"
        );

        let mut commands = Vec::new();
        while admit_next(
            &mut self.state,
            &mut self.backlog,
            &mut self.in_flight,
            &self.config.topic,
            &mut commands,
        ) {}

        maybe_signal_done(&mut self.state, &mut commands);
        self.state.check_invariants();

        Ok(DispatchStep {
            commands,
            done: self.state.done,
        })
    }

    /// Handle one finished task.
    ///
    /// In order: log the sanitized record, warn on failure (no retry), count
    /// the completion, admit at most one backlog entry into the freed slot,
    /// and signal completion if nothing is left.
    pub fn on_completion(&mut self, record: CompletionRecord) -> Result<DispatchStep> {
        if !self.started {
            return Err(MdEnsembleError::Protocol(
                "completion received before dispatch started".to_string(),
            ));
        }

        let (task_id, input_dir) =
            resolve_record(&record, &self.config.topic, &mut self.in_flight, &self.state)?;

        let mut commands = Vec::new();

        if !record.success {
            warn!(
                task_id = %task_id,
                input_dir = %input_dir.display(),
                error = record.error.as_deref().unwrap_or("unknown error"),
                "Bad task result"
            );
            self.state.failed_count += 1;
        }
        record_result(task_id, &self.config.topic, input_dir, record, &mut commands);

        self.state.completed_count += 1;

        admit_next(
            &mut self.state,
            &mut self.backlog,
            &mut self.in_flight,
            &self.config.topic,
            &mut commands,
        );

        maybe_signal_done(&mut self.state, &mut commands);
        self.state.check_invariants();

        Ok(DispatchStep {
            commands,
            done: self.state.done,
        })
    }
}
