// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::ExecutorOptions;
use crate::sink::{SinkOptions, SinkOverflow};
use crate::types::FailurePolicy;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 2
/// cycles = 2
/// failure_policy = "skip_dependents"
///
/// [sink]
/// poll_interval_ms = 100
///
/// [task.C]
/// cmd = "sleep 1"
/// after = ["A", "B"]
/// ```
///
/// All sections are optional and have reasonable defaults, but validation
/// requires at least one task.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub sink: SinkSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`
/// (see `config::validate`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub sink: SinkSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        sink: SinkSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self { config, sink, task }
    }

    /// Executor options described by `[config]` and `[sink]`.
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            workers: self.config.workers,
            failure_policy: self.config.failure_policy,
            progress_interval: Duration::from_millis(self.config.progress_interval_ms),
            sink: SinkOptions {
                poll_interval: Duration::from_millis(self.sink.poll_interval_ms),
                overflow: match self.sink.capacity {
                    Some(capacity) => SinkOverflow::DropOldest { capacity },
                    None => SinkOverflow::Unbounded,
                },
            },
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Worker threads in the pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How many times the whole graph is executed.
    #[serde(default = "default_cycles")]
    pub cycles: usize,

    /// `"skip_dependents"` (default) or `"fail_fast"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_workers() -> usize {
    2
}

fn default_cycles() -> usize {
    1
}

fn default_progress_interval_ms() -> u64 {
    5_000
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cycles: default_cycles(),
            failure_policy: FailurePolicy::default(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// `[sink]` section: completion log behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkSection {
    /// Longest time the log consumer sleeps between shutdown checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// If set, the log queue is bounded and drops its oldest entry when full.
    #[serde(default)]
    pub capacity: Option<usize>,
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            capacity: None,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// The shell command to execute.
    pub cmd: String,

    /// Tasks that must succeed before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
}
