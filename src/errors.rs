// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhasegraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A project has no script for a phase that requires one.
    #[error(
        "project '{project}' does not define a script for phase '{phase}' \
         (set ignore_missing_script = true on the phase to allow this)"
    )]
    MissingScript { project: String, phase: String },

    #[error("Cycle detected in operation graph: {0}")]
    DependencyCycle(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PhasegraphError {
    /// Whether this error was detected before any operation could start.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PhasegraphError::ConfigError(_)
                | PhasegraphError::MissingScript { .. }
                | PhasegraphError::DependencyCycle(_)
                | PhasegraphError::UnknownProject(_)
                | PhasegraphError::UnknownPhase(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PhasegraphError>;
