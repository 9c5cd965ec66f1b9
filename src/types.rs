use std::fmt;

use serde::{Deserialize, Serialize};

/// Topic used when the config does not name one.
///
/// The ensemble workload only ever runs a single category of task.
pub const DEFAULT_TOPIC: &str = "task";

/// Identity of a task: its position in the backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Solvent model handed to the simulation worker.
///
/// - `Implicit` (default): generalized Born implicit solvent.
/// - `Explicit`: periodic box with a barostat; requires a topology file in the
///   input directory (checked by the worker, not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolventType {
    #[default]
    Implicit,
    Explicit,
}

/// Barostat used for explicit-solvent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExplicitBarostat {
    #[default]
    MonteCarloBarostat,
    MonteCarloAnisotropicBarostat,
}
