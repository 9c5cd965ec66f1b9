use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compute::ComputeSettings;
use crate::types::{DEFAULT_TOPIC, ExplicitBarostat, SolventType};

/// Workflow configuration as read from a TOML file, before validation.
///
/// ```toml
/// output_dir = "runs/ensemble"
/// simulation_input_dir = "inputs"
/// num_parallel_tasks = 4
///
/// [task]
/// cmd = "python -m mdensemble.run --input {input_dir} --workdir {workdir}"
///
/// [simulation]
/// solvent_type = "explicit"
/// simulation_length_ns = 10.0
///
/// [compute]
/// name = "workstation"
/// available_accelerators = 4
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfigFile {
    /// Everything the run writes lives under this directory.
    pub output_dir: PathBuf,

    /// Directory whose immediate subdirectories are the task inputs.
    pub simulation_input_dir: PathBuf,

    /// Number of tasks kept in flight (the dispatch window).
    #[serde(default = "default_num_parallel_tasks")]
    pub num_parallel_tasks: usize,

    /// Optional node-local scratch directory; work directories are created
    /// there and moved to `output_dir/tasks` once the task succeeds.
    #[serde(default)]
    pub node_local_path: Option<PathBuf>,

    /// Label for the task category and its result stream.
    #[serde(default = "default_topic")]
    pub topic: String,

    pub task: TaskSection,

    #[serde(default)]
    pub simulation: SimulationSettings,

    #[serde(default)]
    pub compute: ComputeSettings,
}

/// Validated workflow configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// [`crate::config::validate`]).
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFile {
    pub output_dir: PathBuf,
    pub simulation_input_dir: PathBuf,
    pub num_parallel_tasks: usize,
    pub node_local_path: Option<PathBuf>,
    pub topic: String,
    pub task: TaskSection,
    pub simulation: SimulationSettings,
    pub compute: ComputeSettings,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            output_dir: raw.output_dir,
            simulation_input_dir: raw.simulation_input_dir,
            num_parallel_tasks: raw.num_parallel_tasks,
            node_local_path: raw.node_local_path,
            topic: raw.topic,
            task: raw.task,
            simulation: raw.simulation,
            compute: raw.compute,
        }
    }

    /// Where completion records are appended (`<topic>.json` per topic).
    pub fn result_dir(&self) -> PathBuf {
        self.output_dir.join("result")
    }

    /// Persistent home of every task's work directory.
    pub fn task_output_dir(&self) -> PathBuf {
        self.output_dir.join("tasks")
    }

    pub fn log_file(&self) -> PathBuf {
        self.output_dir.join("runtime.log")
    }

    pub fn params_file(&self) -> PathBuf {
        self.output_dir.join("params.toml")
    }
}

/// `[task]` section: how one task is launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSection {
    /// Shell command template. Placeholders: `{input_dir}`, `{workdir}`,
    /// `{task_id}`.
    pub cmd: String,
}

/// `[simulation]` section.
///
/// The dispatcher never interprets these values; they are written to
/// `simulation.json` in every work directory for the worker to pick up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default)]
    pub solvent_type: SolventType,
    #[serde(default = "default_simulation_length_ns")]
    pub simulation_length_ns: f64,
    #[serde(default = "default_report_interval_ps")]
    pub report_interval_ps: f64,
    #[serde(default = "default_dt_ps")]
    pub dt_ps: f64,
    #[serde(default = "default_temperature_kelvin")]
    pub temperature_kelvin: f64,
    #[serde(default = "default_friction")]
    pub heat_bath_friction_coef: f64,
    #[serde(default = "default_pressure")]
    pub pressure: f64,
    #[serde(default)]
    pub explicit_barostat: ExplicitBarostat,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            solvent_type: SolventType::default(),
            simulation_length_ns: default_simulation_length_ns(),
            report_interval_ps: default_report_interval_ps(),
            dt_ps: default_dt_ps(),
            temperature_kelvin: default_temperature_kelvin(),
            heat_bath_friction_coef: default_friction(),
            pressure: default_pressure(),
            explicit_barostat: ExplicitBarostat::default(),
        }
    }
}

fn default_num_parallel_tasks() -> usize {
    4
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_simulation_length_ns() -> f64 {
    10.0
}

fn default_report_interval_ps() -> f64 {
    50.0
}

fn default_dt_ps() -> f64 {
    0.002
}

fn default_temperature_kelvin() -> f64 {
    310.0
}

fn default_friction() -> f64 {
    1.0
}

fn default_pressure() -> f64 {
    1.0
}
