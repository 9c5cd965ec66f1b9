// src/engine/mod.rs

//! Dispatch engine for mdensemble.
//!
//! This module ties together:
//! - the dispatch controller (fixed-window admission over the backlog)
//! - the runtime event loop that reacts to:
//!   - task completion records from the executor gateway
//!   - shutdown signals
//!
//! The pure state machine lives in [`core`] (with its transition helpers in
//! [`event_handlers`] and counters in [`state`]); the async/IO shell is
//! implemented in [`runtime`].

use crate::record::CompletionRecord;

/// Events flowing into the runtime from the gateway and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A submitted task reached a terminal state.
    TaskCompleted(CompletionRecord),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod state;

pub use core::{DispatchConfig, DispatchController};
pub use event_handlers::{DispatchCommand, DispatchStep};
pub use runtime::{RunSummary, Runtime};
pub use state::DispatchState;
