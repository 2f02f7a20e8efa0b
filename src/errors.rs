// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::dag::TaskName;

#[derive(Error, Debug)]
pub enum DagrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Duplicate task: '{0}' is already registered")]
    DuplicateTask(TaskName),

    #[error("Unknown dependency: task '{task}' depends on unregistered task '{dependency}'")]
    UnknownDependency { task: TaskName, dependency: TaskName },

    #[error("Cycle detected in task graph: {}", .0.join(" -> "))]
    CycleDetected(Vec<TaskName>),

    #[error("Worker pool is closed; no further work is accepted")]
    PoolClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DagrunError {
    /// Errors that describe an invalid graph or config. These are reported
    /// before any task runs and are never retried.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DagrunError::ConfigError(_)
                | DagrunError::DuplicateTask(_)
                | DagrunError::UnknownDependency { .. }
                | DagrunError::CycleDetected(_)
                | DagrunError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagrunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let err = DagrunError::CycleDetected(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(err.to_string(), "Cycle detected in task graph: A -> B -> A");
        assert!(err.is_configuration_error());
    }

    #[test]
    fn pool_closed_is_not_configuration() {
        assert!(!DagrunError::PoolClosed.is_configuration_error());
    }
}
