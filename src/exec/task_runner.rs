// src/exec/task_runner.rs

//! Runs one attempt of one task as a shell process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backlog::TaskInput;
use crate::compute::ExecutionContext;
use crate::config::{ConfigFile, SimulationSettings};
use crate::types::TaskId;

/// Name of the settings file written into every work directory.
pub const SIMULATION_SETTINGS_FILE: &str = "simulation.json";

/// Everything a worker needs besides the task itself.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Shell command template, see [`render_command`].
    pub cmd_template: String,
    /// Persistent home of the work directories.
    pub task_output_dir: PathBuf,
    /// Scratch space; work directories move to `task_output_dir` on success.
    pub node_local_path: Option<PathBuf>,
    pub simulation: SimulationSettings,
    pub context: ExecutionContext,
}

impl WorkerSettings {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            cmd_template: cfg.task.cmd.clone(),
            task_output_dir: cfg.task_output_dir(),
            node_local_path: cfg.node_local_path.clone(),
            simulation: cfg.simulation.clone(),
            context: cfg.compute.build_execution_context(),
        }
    }
}

/// Result of one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// Exit code, or -1 when the process was killed by a signal.
    pub exit_code: i32,
    pub exited_successfully: bool,
    /// Where the task's files ended up.
    pub workdir: PathBuf,
}

impl AttemptOutcome {
    pub fn success(&self) -> bool {
        self.exited_successfully
    }
}

/// Substitute `{input_dir}`, `{workdir}` and `{task_id}` in a command template.
pub fn render_command(template: &str, input_dir: &Path, workdir: &Path, task_id: TaskId) -> String {
    template
        .replace("{input_dir}", &input_dir.display().to_string())
        .replace("{workdir}", &workdir.display().to_string())
        .replace("{task_id}", &task_id.to_string())
}

/// Run a single attempt of `task`.
///
/// Each attempt gets a fresh work directory named by a random UUID, under
/// `node_local_path` if configured and `task_output_dir` otherwise. The
/// simulation settings are written there before the process starts. A
/// successful attempt staged on node-local storage is moved to
/// `task_output_dir` afterwards.
///
/// `Err` means the attempt could not be carried out at all (directory
/// creation, spawn, move); a process that ran and failed is an `Ok` outcome
/// with a non-zero exit code.
pub async fn run_attempt(
    task: &TaskInput,
    settings: &WorkerSettings,
    accelerator: Option<&str>,
) -> Result<AttemptOutcome> {
    let workdir_name = Uuid::new_v4().to_string();
    let staging_root = settings
        .node_local_path
        .as_ref()
        .unwrap_or(&settings.task_output_dir);
    let workdir = staging_root.join(&workdir_name);

    tokio::fs::create_dir_all(&workdir)
        .await
        .with_context(|| format!("creating work directory {:?}", workdir))?;

    let simulation_json = serde_json::to_vec_pretty(&settings.simulation)
        .context("serializing simulation settings")?;
    tokio::fs::write(workdir.join(SIMULATION_SETTINGS_FILE), simulation_json)
        .await
        .with_context(|| format!("writing simulation settings into {:?}", workdir))?;

    let rendered = render_command(&settings.cmd_template, &task.input_dir, &workdir, task.id);
    let script = match &settings.context.worker_init {
        Some(init) => format!("{init}\n{rendered}"),
        None => rendered,
    };

    info!(
        task_id = %task.id,
        workdir = %workdir.display(),
        accelerator = accelerator.unwrap_or("none"),
        cmd = %script,
        "starting task process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&script);
        c
    };

    cmd.env("MDENSEMBLE_TASK_ID", task.id.to_string())
        .env("MDENSEMBLE_WORKDIR", &workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(accelerator) = accelerator {
        cmd.env(settings.context.accelerator_env, accelerator);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task {}", task.id))?;

    // Always consume output so pipe buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_output(stdout, task.id, "stdout"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output(stderr, task.id, "stderr"));
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task {}", task.id))?;

    let exit_code = status.code().unwrap_or(-1);
    info!(
        task_id = %task.id,
        exit_code,
        success = status.success(),
        "task process exited"
    );

    let workdir = if status.success() && settings.node_local_path.is_some() {
        let destination = settings.task_output_dir.join(&workdir_name);
        persist_workdir(&workdir, &destination).await?;
        destination
    } else {
        workdir
    };

    Ok(AttemptOutcome {
        exit_code,
        exited_successfully: status.success(),
        workdir,
    })
}

async fn forward_output<R>(reader: R, task_id: TaskId, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(task_id = %task_id, stream, "{}", line);
    }
}

/// Move a work directory from node-local storage to persistent storage.
///
/// Node-local scratch is usually a different filesystem, so a failed rename
/// falls back to copy + delete.
async fn persist_workdir(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {:?}", parent))?;
    }

    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    debug!(from = %from.display(), to = %to.display(), "rename failed; copying work directory");
    let (src, dst) = (from.to_path_buf(), to.to_path_buf());
    tokio::task::spawn_blocking(move || copy_dir_all(&src, &dst))
        .await
        .context("joining work directory copy")??;

    if let Err(e) = tokio::fs::remove_dir_all(from).await {
        warn!(path = %from.display(), error = %e, "failed to remove node-local work directory");
    }
    Ok(())
}

fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).with_context(|| format!("creating {:?}", to))?;
    for entry in std::fs::read_dir(from).with_context(|| format!("reading dir {:?}", from))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("copying {:?} to {:?}", entry.path(), target))?;
        }
    }
    Ok(())
}
