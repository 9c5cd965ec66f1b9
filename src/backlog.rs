// src/backlog.rs

//! The task backlog: every input directory the run will process, consumed
//! front to back exactly once.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{MdEnsembleError, Result};
use crate::fs::FileSystem;
use crate::types::TaskId;

/// One unit of work: a directory holding the start files of one simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput {
    pub id: TaskId,
    pub input_dir: PathBuf,
}

/// Ordered, finite queue of not-yet-submitted task inputs.
///
/// Inputs leave the backlog by value; once taken they are never seen again,
/// so the cursor can only move forward.
#[derive(Debug, Clone, Default)]
pub struct TaskBacklog {
    pending: VecDeque<TaskInput>,
    total: usize,
}

impl TaskBacklog {
    /// Build a backlog from input directories, assigning ids in order.
    pub fn from_dirs(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        let pending: VecDeque<TaskInput> = dirs
            .into_iter()
            .enumerate()
            .map(|(i, input_dir)| TaskInput {
                id: TaskId(i as u64),
                input_dir,
            })
            .collect();
        let total = pending.len();
        Self { pending, total }
    }

    /// One task per immediate subdirectory of `root`, sorted by path.
    ///
    /// Directory enumeration order is filesystem dependent; sorting keeps task
    /// ids stable between runs.
    pub fn from_input_dir(fs: &dyn FileSystem, root: &Path) -> Result<Self> {
        if !fs.is_dir(root) {
            return Err(MdEnsembleError::ConfigError(format!(
                "simulation input directory {:?} does not exist",
                root
            )));
        }

        let mut dirs: Vec<PathBuf> = fs
            .read_dir(root)
            .with_context(|| format!("enumerating simulation inputs in {:?}", root))?
            .into_iter()
            .filter(|p| fs.is_dir(p))
            .collect();
        dirs.sort();

        debug!(root = %root.display(), count = dirs.len(), "enumerated input directories");
        info!("Processing {} input directories", dirs.len());

        Ok(Self::from_dirs(dirs))
    }

    /// Number of inputs the backlog started with.
    pub fn total(&self) -> usize {
        self.total
    }

    /// How many inputs have been taken so far.
    pub fn cursor(&self) -> usize {
        self.total - self.pending.len()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the next input, advancing the cursor.
    pub fn take_next(&mut self) -> Option<TaskInput> {
        self.pending.pop_front()
    }

    /// Look at the pending inputs without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &TaskInput> {
        self.pending.iter()
    }
}
