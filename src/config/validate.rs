// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::dag::TaskGraph;
use crate::errors::{DagrunError, Result};
use crate::exec::CommandTask;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DagrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.sink, raw.task))
    }
}

/// Validate a raw config without consuming it.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_sink_config(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(DagrunError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(DagrunError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.cycles == 0 {
        return Err(DagrunError::ConfigError(
            "[config].cycles must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.progress_interval_ms == 0 {
        return Err(DagrunError::ConfigError(
            "[config].progress_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_sink_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.sink.poll_interval_ms == 0 {
        return Err(DagrunError::ConfigError(
            "[sink].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.sink.capacity == Some(0) {
        return Err(DagrunError::ConfigError(
            "[sink].capacity must be >= 1 when set (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Unknown `after` references and cycles are reported with the same
/// structured errors the executor would produce.
fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    graph_from_tasks(&cfg.task)?.validate()
}

/// Register one [`CommandTask`] per `[task.<name>]` section.
fn graph_from_tasks(tasks: &BTreeMap<String, TaskConfig>) -> Result<TaskGraph> {
    let mut graph = TaskGraph::new();
    for (name, task) in tasks.iter() {
        graph.register_task(
            name.clone(),
            task.after.iter().cloned(),
            CommandTask::new(task.cmd.clone()),
        )?;
    }
    Ok(graph)
}

impl ConfigFile {
    /// Build the executable task graph for this config.
    pub fn build_graph(&self) -> Result<TaskGraph> {
        graph_from_tasks(&self.task)
    }
}
