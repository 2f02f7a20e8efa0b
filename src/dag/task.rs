// src/dag/task.rs

//! The task capability and per-cycle task states.

use std::fmt;

use anyhow::Result;

use crate::dag::TaskName;

/// A unit of work that can be registered in a [`TaskGraph`](crate::dag::TaskGraph).
///
/// `run` is invoked at most once per cycle, only after every declared
/// dependency has succeeded in that cycle. Different tasks may run at the same
/// time on different workers, so implementations must be `Send + Sync`; any
/// state shared between tasks is the implementor's responsibility.
///
/// Returning `Err` (or panicking) marks the task `Failed` for the cycle.
pub trait Task: Send + Sync {
    fn run(&self, ctx: &TaskContext<'_>) -> Result<()>;
}

impl<F> Task for F
where
    F: Fn(&TaskContext<'_>) -> Result<()> + Send + Sync,
{
    fn run(&self, ctx: &TaskContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// Adapt a closure that does not care about its [`TaskContext`].
pub fn task_fn<F>(f: F) -> impl Task
where
    F: Fn() -> Result<()> + Send + Sync,
{
    move |_: &TaskContext<'_>| f()
}

/// Information handed to a task body while it runs.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    name: &'a str,
    generation: u64,
}

impl<'a> TaskContext<'a> {
    pub fn new(name: &'a str, generation: u64) -> Self {
        Self { name, generation }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// 1-based number of the cycle this invocation belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// State of a task within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting for dependencies.
    Pending,
    /// Submitted to the worker pool.
    Running,
    Succeeded,
    Failed,
    /// Never ran because an upstream task failed.
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Result of a single task invocation, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// `run` returned an error, or panicked (`panicked = true`).
    Failed { reason: String, panicked: bool },
}

impl TaskOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        TaskOutcome::Failed {
            reason: reason.into(),
            panicked: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// A registered task: identity, declared dependencies and its body.
pub struct TaskNode {
    pub(crate) name: TaskName,
    pub(crate) deps: Vec<TaskName>,
    pub(crate) task: Box<dyn Task>,
}

impl TaskNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[TaskName] {
        &self.deps
    }

    pub fn task(&self) -> &dyn Task {
        self.task.as_ref()
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}
