// src/dag/mod.rs

//! Task graph representation and per-cycle scheduling state.
//!
//! - [`task`] defines the `Task` capability, `TaskState` and `TaskOutcome`.
//! - [`graph`] holds registered tasks and their dependency edges.
//! - [`validate`] rejects unknown dependencies and cycles before a run.
//! - [`state`] is the pure per-cycle state machine (in-degrees, ready set,
//!   failure propagation).

pub mod graph;
pub mod state;
pub mod task;
pub mod validate;

/// Canonical task name type.
pub type TaskName = String;

pub use graph::TaskGraph;
pub use state::{CompletionStep, CycleState};
pub use task::{task_fn, Task, TaskContext, TaskNode, TaskOutcome, TaskState};
