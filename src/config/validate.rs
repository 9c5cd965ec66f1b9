use crate::config::model::{ConfigFile, RawConfigFile, SimulationSettings};
use crate::errors::{MdEnsembleError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::MdEnsembleError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_input_dir(cfg)?;
    validate_topic(cfg)?;
    validate_task_command(cfg)?;
    validate_simulation(&cfg.simulation)?;
    cfg.compute.validate()?;
    Ok(())
}

// `num_parallel_tasks = 0` is only invalid with a non-empty backlog; the
// dispatch controller checks that once the backlog is known.

fn validate_input_dir(cfg: &RawConfigFile) -> Result<()> {
    if !cfg.simulation_input_dir.is_dir() {
        return Err(MdEnsembleError::ConfigError(format!(
            "simulation_input_dir {:?} does not exist or is not a directory",
            cfg.simulation_input_dir
        )));
    }
    Ok(())
}

fn validate_topic(cfg: &RawConfigFile) -> Result<()> {
    let topic = cfg.topic.trim();
    if topic.is_empty() {
        return Err(MdEnsembleError::ConfigError(
            "topic must not be empty".to_string(),
        ));
    }
    // The topic names the result file.
    if topic.contains(['/', '\\']) {
        return Err(MdEnsembleError::ConfigError(format!(
            "topic '{}' must not contain path separators",
            cfg.topic
        )));
    }
    Ok(())
}

fn validate_task_command(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.cmd.trim().is_empty() {
        return Err(MdEnsembleError::ConfigError(
            "[task].cmd must not be empty".to_string(),
        ));
    }
    if !cfg.task.cmd.contains("{input_dir}") {
        return Err(MdEnsembleError::ConfigError(format!(
            "[task].cmd must reference {{input_dir}} (got \"{}\")",
            cfg.task.cmd
        )));
    }
    Ok(())
}

fn validate_simulation(sim: &SimulationSettings) -> Result<()> {
    let positive = [
        ("simulation_length_ns", sim.simulation_length_ns),
        ("report_interval_ps", sim.report_interval_ps),
        ("dt_ps", sim.dt_ps),
        ("temperature_kelvin", sim.temperature_kelvin),
        ("heat_bath_friction_coef", sim.heat_bath_friction_coef),
        ("pressure", sim.pressure),
    ];

    for (field, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            return Err(MdEnsembleError::ConfigError(format!(
                "[simulation].{field} must be a positive number (got {value})"
            )));
        }
    }

    if sim.report_interval_ps < sim.dt_ps {
        return Err(MdEnsembleError::ConfigError(format!(
            "[simulation].report_interval_ps ({}) must be >= dt_ps ({})",
            sim.report_interval_ps, sim.dt_ps
        )));
    }

    Ok(())
}
