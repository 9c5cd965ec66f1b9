// src/config/mod.rs

//! Configuration loading and validation for mdensemble.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and persist the effective one (`loader.rs`).
//! - Validate invariants serde can't express (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{dump_params, load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile, SimulationSettings, TaskSection};
