// src/engine/state.rs

//! Counters of the dispatch controller.

/// Snapshot of the controller's admission state.
///
/// Invariants, checked after every transition:
/// - `submitted_count - completed_count <= window_size`
/// - `submitted_count <= backlog_size`
/// - `done` iff everything was submitted and everything submitted completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchState {
    pub submitted_count: usize,
    pub completed_count: usize,
    /// Completions that reported `success = false`.
    pub failed_count: usize,
    pub window_size: usize,
    pub backlog_size: usize,
    pub done: bool,
}

impl DispatchState {
    pub fn new(window_size: usize, backlog_size: usize) -> Self {
        Self {
            submitted_count: 0,
            completed_count: 0,
            failed_count: 0,
            window_size,
            backlog_size,
            done: false,
        }
    }

    /// Tasks submitted but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.submitted_count - self.completed_count
    }

    pub fn has_free_slot(&self) -> bool {
        self.in_flight() < self.window_size
    }

    pub fn all_resolved(&self) -> bool {
        self.submitted_count == self.backlog_size && self.completed_count == self.submitted_count
    }

    pub(crate) fn check_invariants(&self) {
        debug_assert!(self.completed_count <= self.submitted_count);
        debug_assert!(self.in_flight() <= self.window_size);
        debug_assert!(self.submitted_count <= self.backlog_size);
        debug_assert_eq!(self.done, self.all_resolved());
    }
}
