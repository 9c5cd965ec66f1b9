#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mdensemble::backlog::TaskBacklog;
use mdensemble::compute::{ComputeSettings, LocalSettings};
use mdensemble::config::{ConfigFile, RawConfigFile, SimulationSettings, TaskSection};

/// Builder for `ConfigFile` to simplify test setup.
///
/// The input directory must exist by the time `build` is called.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(input_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            config: RawConfigFile {
                output_dir: output_dir.as_ref().to_path_buf(),
                simulation_input_dir: input_dir.as_ref().to_path_buf(),
                num_parallel_tasks: 4,
                node_local_path: None,
                topic: "task".to_string(),
                task: TaskSection {
                    cmd: "true {input_dir}".to_string(),
                },
                simulation: SimulationSettings::default(),
                compute: ComputeSettings::default(),
            },
        }
    }

    pub fn num_parallel_tasks(mut self, n: usize) -> Self {
        self.config.num_parallel_tasks = n;
        self
    }

    pub fn topic(mut self, topic: &str) -> Self {
        self.config.topic = topic.to_string();
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.config.task.cmd = cmd.to_string();
        self
    }

    pub fn node_local_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.node_local_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn local_workers(mut self, max_workers: usize) -> Self {
        self.config.compute = ComputeSettings::Local(LocalSettings {
            max_workers,
            ..LocalSettings::default()
        });
        self
    }

    pub fn compute(mut self, compute: ComputeSettings) -> Self {
        self.config.compute = compute;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Backlog of `n` synthetic inputs named `input_000`, `input_001`, ...
pub fn backlog_of(n: usize) -> TaskBacklog {
    TaskBacklog::from_dirs((0..n).map(|i| PathBuf::from(format!("inputs/input_{i:03}"))))
}

/// Create `n` input subdirectories under `root`, returning their paths.
pub fn create_input_dirs(root: &Path, n: usize) -> Vec<PathBuf> {
    (0..n)
        .map(|i| {
            let dir = root.join(format!("input_{i:03}"));
            std::fs::create_dir_all(&dir).expect("create input dir");
            dir
        })
        .collect()
}
