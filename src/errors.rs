// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MdEnsembleError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A completion record broke the dispatch protocol (unknown or repeated
    /// task identity, missing fields, foreign topic). The admission bound can
    /// no longer be trusted once this happens.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Executor gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MdEnsembleError>;
