// src/lib.rs

pub mod backlog;
pub mod cli;
pub mod compute;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod record;
pub mod result_log;
pub mod types;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backlog::TaskBacklog;
use crate::cli::CliArgs;
use crate::compute::ComputeSettings;
use crate::config::ConfigFile;
use crate::engine::{DispatchConfig, DispatchController, RunSummary, Runtime, RuntimeEvent};
use crate::errors::Result;
use crate::exec::{ProcessGateway, WorkerSettings};
use crate::fs::RealFileSystem;
use crate::result_log::ResultLog;

/// Capacity of the runtime event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - backlog enumeration
/// - dispatch controller / result log / runtime
/// - process gateway
/// - Ctrl-C handling
///
/// The config must already be loaded and logging initialised.
pub async fn run(args: CliArgs, cfg: ConfigFile) -> Result<RunSummary> {
    let backlog = TaskBacklog::from_input_dir(&RealFileSystem, &cfg.simulation_input_dir)?;

    let dispatch = DispatchConfig {
        window_size: cfg.num_parallel_tasks,
        topic: cfg.topic.clone(),
    };
    // Construction validates the window against the backlog, so a dry run
    // rejects the same configs a real run would.
    let controller = DispatchController::new(dispatch, backlog)?;

    if args.dry_run {
        print_dry_run(&cfg, controller.backlog());
        return Ok(RunSummary {
            submitted: 0,
            completed: 0,
            failed: 0,
            interrupted: false,
        });
    }

    std::fs::create_dir_all(cfg.task_output_dir())?;
    let result_log = ResultLog::open(cfg.result_dir())?;

    // Runtime event channel; the gateway reports completions on it.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);

    let gateway = ProcessGateway::new(WorkerSettings::from_config(&cfg), rt_tx.clone());
    info!("Created the task server and task generator");

    // Ctrl-C → stop dispatching.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    let runtime = Runtime::new(controller, rt_rx, gateway, result_log);
    let summary = runtime.run().await?;

    info!(
        submitted = summary.submitted,
        completed = summary.completed,
        failed = summary.failed,
        interrupted = summary.interrupted,
        "Task generator has completed"
    );

    Ok(summary)
}

/// Simple dry-run output: print the plan and the backlog.
fn print_dry_run(cfg: &ConfigFile, backlog: &TaskBacklog) {
    let ctx = cfg.compute.build_execution_context();

    println!("mdensemble dry-run");
    println!("  output_dir = {}", cfg.output_dir.display());
    println!("  simulation_input_dir = {}", cfg.simulation_input_dir.display());
    println!("  num_parallel_tasks = {}", cfg.num_parallel_tasks);
    println!("  topic = {}", cfg.topic);
    if let Some(ref local) = cfg.node_local_path {
        println!("  node_local_path = {}", local.display());
    }
    println!("  task.cmd = {}", cfg.task.cmd);
    println!();

    println!("compute ({}):", cfg.compute.name());
    println!("  label = {}", ctx.label);
    println!("  max_workers = {}", ctx.max_workers);
    println!("  retries = {}", ctx.retries);
    if !ctx.accelerators.is_empty() {
        println!("  {} = {:?}", ctx.accelerator_env, ctx.accelerators);
    }
    match &cfg.compute {
        ComputeSettings::Polaris(s) => {
            println!(
                "  batch: account={} queue={} walltime={} nodes={} cpus_per_node={}",
                s.account, s.queue, s.walltime, s.num_nodes, s.cpus_per_node
            );
        }
        ComputeSettings::Sunspot(s) => {
            println!(
                "  batch: account={} queue={} walltime={} nodes={} cpus_per_node={}",
                s.account, s.queue, s.walltime, s.num_nodes, s.cpus_per_node
            );
        }
        ComputeSettings::Local(_) | ComputeSettings::Workstation(_) => {}
    }
    println!();

    println!("backlog ({}):", backlog.total());
    for input in backlog.iter() {
        println!("  [{}] {}", input.id, input.input_dir.display());
    }

    debug!("dry-run complete (no execution)");
}
