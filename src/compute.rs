// src/compute.rs

//! Compute platform settings.
//!
//! Each supported platform is one variant of [`ComputeSettings`], selected in
//! the config by `[compute].name`. Every variant knows how to turn itself into
//! an [`ExecutionContext`], which is all the process gateway needs: how many
//! workers may run at once, which accelerator each worker is pinned to, how
//! often a failed attempt is retried, and an optional shell prologue.
//!
//! Submitting to the batch schedulers of the HPC platforms is not handled
//! here; the `account` / `queue` / `walltime` fields are validated and shown
//! in dry-run output only.

use serde::{Deserialize, Serialize};

use crate::errors::{MdEnsembleError, Result};

/// Accelerators available to the workers, either as a count (ids `0..n`) or as
/// an explicit list of device ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Accelerators {
    Count(u32),
    Ids(Vec<String>),
}

impl Accelerators {
    pub fn ids(&self) -> Vec<String> {
        match self {
            Accelerators::Count(n) => (0..*n).map(|i| i.to_string()).collect(),
            Accelerators::Ids(ids) => ids.clone(),
        }
    }
}

impl Default for Accelerators {
    fn default() -> Self {
        Accelerators::Count(8)
    }
}

/// `[compute]` section, tagged by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum ComputeSettings {
    Local(LocalSettings),
    Workstation(WorkstationSettings),
    Polaris(PolarisSettings),
    Sunspot(SunspotSettings),
}

impl Default for ComputeSettings {
    fn default() -> Self {
        ComputeSettings::Local(LocalSettings::default())
    }
}

/// Single machine, no accelerators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSettings {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_label")]
    pub label: String,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            label: default_label(),
        }
    }
}

/// Multi-GPU workstation: one worker per accelerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkstationSettings {
    #[serde(default)]
    pub available_accelerators: Accelerators,
    #[serde(default = "default_workstation_retries")]
    pub retries: u32,
    #[serde(default = "default_label")]
    pub label: String,
}

/// ALCF Polaris: 4 A100 GPUs per node, one worker per GPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarisSettings {
    #[serde(default = "default_num_nodes")]
    pub num_nodes: u32,
    /// Shell prologue run before each task (module loads, env activation).
    #[serde(default)]
    pub worker_init: String,
    pub account: String,
    pub queue: String,
    pub walltime: String,
    #[serde(default = "default_polaris_cpus")]
    pub cpus_per_node: u32,
    #[serde(default = "default_label")]
    pub label: String,
}

/// ALCF Sunspot: 6 GPUs × 2 tiles per node, one worker per tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunspotSettings {
    #[serde(default = "default_num_nodes")]
    pub num_nodes: u32,
    #[serde(default)]
    pub worker_init: String,
    pub account: String,
    pub queue: String,
    pub walltime: String,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_sunspot_cpus")]
    pub cpus_per_node: u32,
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_max_workers() -> usize {
    1
}

fn default_label() -> String {
    "htex".to_string()
}

fn default_workstation_retries() -> u32 {
    1
}

fn default_num_nodes() -> u32 {
    1
}

fn default_polaris_cpus() -> u32 {
    64
}

fn default_sunspot_cpus() -> u32 {
    208
}

const POLARIS_GPUS_PER_NODE: u32 = 4;
const SUNSPOT_GPUS_PER_NODE: u32 = 6;
const SUNSPOT_TILES_PER_GPU: u32 = 2;

/// What the process gateway needs to know about the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub label: String,
    /// Upper bound on concurrently running task processes.
    pub max_workers: usize,
    /// One entry per worker slot; empty when tasks are not pinned.
    pub accelerators: Vec<String>,
    /// Environment variable used to pin a worker to its accelerator.
    pub accelerator_env: &'static str,
    /// Extra attempts after a failed one.
    pub retries: u32,
    pub worker_init: Option<String>,
}

impl ComputeSettings {
    /// Platform name as written in the config.
    pub fn name(&self) -> &'static str {
        match self {
            ComputeSettings::Local(_) => "local",
            ComputeSettings::Workstation(_) => "workstation",
            ComputeSettings::Polaris(_) => "polaris",
            ComputeSettings::Sunspot(_) => "sunspot",
        }
    }

    pub fn build_execution_context(&self) -> ExecutionContext {
        match self {
            ComputeSettings::Local(s) => ExecutionContext {
                label: s.label.clone(),
                max_workers: s.max_workers,
                accelerators: Vec::new(),
                accelerator_env: "CUDA_VISIBLE_DEVICES",
                retries: 0,
                worker_init: None,
            },
            ComputeSettings::Workstation(s) => {
                let accelerators = s.available_accelerators.ids();
                ExecutionContext {
                    label: s.label.clone(),
                    max_workers: accelerators.len(),
                    accelerators,
                    accelerator_env: "CUDA_VISIBLE_DEVICES",
                    retries: s.retries,
                    worker_init: None,
                }
            }
            ComputeSettings::Polaris(s) => {
                let accelerators: Vec<String> = (0..s.num_nodes)
                    .flat_map(|_| (0..POLARIS_GPUS_PER_NODE).map(|g| g.to_string()))
                    .collect();
                ExecutionContext {
                    label: s.label.clone(),
                    max_workers: accelerators.len(),
                    accelerators,
                    accelerator_env: "CUDA_VISIBLE_DEVICES",
                    // Lets a task restart if its node is reclaimed at walltime.
                    retries: 1,
                    worker_init: non_empty(&s.worker_init),
                }
            }
            ComputeSettings::Sunspot(s) => {
                let accelerators: Vec<String> = (0..s.num_nodes)
                    .flat_map(|_| {
                        (0..SUNSPOT_GPUS_PER_NODE).flat_map(|gid| {
                            (0..SUNSPOT_TILES_PER_GPU).map(move |tid| format!("{gid}.{tid}"))
                        })
                    })
                    .collect();
                ExecutionContext {
                    label: s.label.clone(),
                    max_workers: accelerators.len(),
                    accelerators,
                    accelerator_env: "ZE_AFFINITY_MASK",
                    retries: s.retries,
                    worker_init: non_empty(&s.worker_init),
                }
            }
        }
    }

    /// Semantic checks that serde can't express.
    pub fn validate(&self) -> Result<()> {
        match self {
            ComputeSettings::Local(s) => {
                if s.max_workers == 0 {
                    return Err(config_err("[compute].max_workers must be >= 1 (got 0)"));
                }
            }
            ComputeSettings::Workstation(s) => {
                if s.available_accelerators.ids().is_empty() {
                    return Err(config_err(
                        "[compute].available_accelerators must name at least one device",
                    ));
                }
            }
            ComputeSettings::Polaris(s) => {
                validate_batch_fields(s.num_nodes, &s.account, &s.queue, &s.walltime)?;
            }
            ComputeSettings::Sunspot(s) => {
                validate_batch_fields(s.num_nodes, &s.account, &s.queue, &s.walltime)?;
            }
        }
        Ok(())
    }
}

fn validate_batch_fields(num_nodes: u32, account: &str, queue: &str, walltime: &str) -> Result<()> {
    if num_nodes == 0 {
        return Err(config_err("[compute].num_nodes must be >= 1 (got 0)"));
    }
    for (field, value) in [("account", account), ("queue", queue), ("walltime", walltime)] {
        if value.trim().is_empty() {
            return Err(config_err(&format!("[compute].{field} must not be empty")));
        }
    }
    Ok(())
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn config_err(msg: &str) -> MdEnsembleError {
    MdEnsembleError::ConfigError(msg.to_string())
}
