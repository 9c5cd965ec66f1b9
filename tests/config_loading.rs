// tests/config_loading.rs

use std::error::Error;
use std::path::Path;

use mdensemble::compute::ComputeSettings;
use mdensemble::config::{dump_params, load_and_validate, load_from_path, ConfigFile};
use mdensemble::errors::MdEnsembleError;
use mdensemble::types::{ExplicitBarostat, SolventType};
use mdensemble_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    std::fs::create_dir_all(dir.join("inputs")).unwrap();
    let path = dir.join("mdensemble.toml");
    let header = format!(
        "output_dir = {:?}\nsimulation_input_dir = {:?}\n",
        dir.join("out"),
        dir.join("inputs")
    );
    std::fs::write(&path, format!("{header}{body}")).unwrap();
    path
}

#[test]
fn minimal_config_gets_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[task]
cmd = "run-md --input {input_dir} --out {workdir}"
"#,
    );

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.num_parallel_tasks, 4);
    assert_eq!(cfg.topic, "task");
    assert!(cfg.node_local_path.is_none());
    assert_eq!(cfg.simulation.solvent_type, SolventType::Implicit);
    assert_eq!(cfg.simulation.dt_ps, 0.002);
    assert_eq!(cfg.simulation.temperature_kelvin, 310.0);
    assert_eq!(cfg.compute.name(), "local");
    assert_eq!(cfg.result_dir(), dir.path().join("out").join("result"));
    Ok(())
}

#[test]
fn full_config_parses_every_section() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
num_parallel_tasks = 8
topic = "md"
node_local_path = "/local/scratch"

[task]
cmd = "run-md {input_dir}"

[simulation]
solvent_type = "explicit"
simulation_length_ns = 2.5
report_interval_ps = 10.0
explicit_barostat = "MonteCarloAnisotropicBarostat"

[compute]
name = "workstation"
available_accelerators = ["0", "2"]
"#,
    );

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.num_parallel_tasks, 8);
    assert_eq!(cfg.topic, "md");
    assert_eq!(cfg.simulation.solvent_type, SolventType::Explicit);
    assert_eq!(
        cfg.simulation.explicit_barostat,
        ExplicitBarostat::MonteCarloAnisotropicBarostat
    );

    let ctx = cfg.compute.build_execution_context();
    assert_eq!(ctx.max_workers, 2);
    assert_eq!(ctx.accelerators, vec!["0".to_string(), "2".to_string()]);
    assert_eq!(ctx.accelerator_env, "CUDA_VISIBLE_DEVICES");
    assert_eq!(ctx.retries, 1);
    Ok(())
}

#[test]
fn polaris_pins_one_worker_per_gpu() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[task]
cmd = "run-md {input_dir}"

[compute]
name = "polaris"
num_nodes = 2
worker_init = "module load conda"
account = "proj"
queue = "debug"
walltime = "01:00:00"
"#,
    );

    let cfg = load_and_validate(&path)?;
    let ctx = cfg.compute.build_execution_context();
    assert_eq!(ctx.max_workers, 8);
    assert_eq!(&ctx.accelerators[..4], &["0", "1", "2", "3"]);
    assert_eq!(ctx.retries, 1);
    assert_eq!(ctx.worker_init.as_deref(), Some("module load conda"));
    match cfg.compute {
        ComputeSettings::Polaris(ref p) => assert_eq!(p.cpus_per_node, 64),
        ref other => panic!("expected polaris, got {other:?}"),
    }
    Ok(())
}

#[test]
fn sunspot_pins_one_worker_per_tile() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[task]
cmd = "run-md {input_dir}"

[compute]
name = "sunspot"
account = "proj"
queue = "workq"
walltime = "00:30:00"
"#,
    );

    let ctx = load_and_validate(&path)?.compute.build_execution_context();
    assert_eq!(ctx.max_workers, 12);
    assert_eq!(ctx.accelerators[0], "0.0");
    assert_eq!(ctx.accelerators[1], "0.1");
    assert_eq!(ctx.accelerators[11], "5.1");
    assert_eq!(ctx.accelerator_env, "ZE_AFFINITY_MASK");
    assert_eq!(ctx.retries, 0);
    assert!(ctx.worker_init.is_none());
    Ok(())
}

#[test]
fn unknown_compute_platform_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[task]
cmd = "run-md {input_dir}"

[compute]
name = "frontier"
"#,
    );

    assert!(matches!(
        load_from_path(&path),
        Err(MdEnsembleError::TomlError(_))
    ));
}

#[test]
fn missing_input_dir_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let raw = ConfigFileBuilder::new(dir.path().join("missing"), dir.path().join("out")).raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(MdEnsembleError::ConfigError(_))
    ));
}

#[test]
fn command_without_input_placeholder_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let raw = ConfigFileBuilder::new(dir.path(), dir.path().join("out"))
        .cmd("run-md --all")
        .raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("{input_dir}"));
}

#[test]
fn topic_with_path_separator_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let raw = ConfigFileBuilder::new(dir.path(), dir.path().join("out"))
        .topic("../escape")
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(MdEnsembleError::ConfigError(_))
    ));
}

#[test]
fn non_positive_simulation_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut raw = ConfigFileBuilder::new(dir.path(), dir.path().join("out")).raw();
    raw.simulation.dt_ps = 0.0;
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("dt_ps"));

    let mut raw = ConfigFileBuilder::new(dir.path(), dir.path().join("out")).raw();
    raw.simulation.report_interval_ps = 0.001;
    assert!(ConfigFile::try_from(raw).is_err());
}

#[test]
fn zero_local_workers_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let raw = ConfigFileBuilder::new(dir.path(), dir.path().join("out"))
        .local_workers(0)
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(MdEnsembleError::ConfigError(_))
    ));
}

#[test]
fn zero_window_passes_config_validation() {
    // Only fatal once the backlog turns out to be non-empty.
    let dir = tempfile::tempdir().unwrap();
    let cfg = ConfigFileBuilder::new(dir.path(), dir.path().join("out"))
        .num_parallel_tasks(0)
        .build();
    assert_eq!(cfg.num_parallel_tasks, 0);
}

#[test]
fn dumped_params_load_back() -> TestResult {
    let dir = tempfile::tempdir()?;
    let cfg = ConfigFileBuilder::new(dir.path(), dir.path().join("out"))
        .num_parallel_tasks(3)
        .topic("md")
        .build();

    let path = dump_params(&cfg)?;
    assert_eq!(path, dir.path().join("out").join("params.toml"));

    let reloaded = load_and_validate(&path)?;
    assert_eq!(reloaded.num_parallel_tasks, 3);
    assert_eq!(reloaded.topic, "md");
    assert_eq!(reloaded.simulation, cfg.simulation);
    assert_eq!(reloaded.compute, cfg.compute);
    Ok(())
}
