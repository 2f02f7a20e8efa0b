// src/dag/state.rs

//! Per-cycle run state.
//!
//! [`CycleState`] is a synchronous, deterministic state machine: it knows
//! nothing about threads or the worker pool. The executor keeps one behind a
//! mutex for the duration of a cycle and feeds it completions; tests can drive
//! it directly.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::task::{TaskOutcome, TaskState};
use crate::dag::{TaskGraph, TaskName};
use crate::engine::report::CycleReport;
use crate::types::FailurePolicy;

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: TaskState,
    /// Dependencies that have not succeeded yet in this cycle (in-degree).
    remaining: usize,
}

/// Structured result of feeding one completion into a [`CycleState`].
#[derive(Debug, Clone, Default)]
pub struct CompletionStep {
    /// Dependents whose last dependency just succeeded; already marked
    /// `Running` and must be submitted by the caller.
    pub newly_ready: Vec<TaskName>,
    /// Tasks marked `Skipped` because of this completion.
    pub newly_skipped: Vec<TaskName>,
    /// Whether every task is now terminal.
    pub cycle_complete: bool,
}

/// Mutable state of one execution cycle over a [`TaskGraph`].
#[derive(Debug)]
pub struct CycleState {
    generation: u64,
    policy: FailurePolicy,
    slots: HashMap<TaskName, Slot>,
    failures: BTreeMap<TaskName, String>,
    /// Tasks that are still `Pending` or `Running`.
    open: usize,
}

impl CycleState {
    /// Build fresh state for a validated graph: every task `Pending`, with
    /// its in-degree taken from the static dependency declarations.
    pub fn new(graph: &TaskGraph, generation: u64, policy: FailurePolicy) -> Self {
        let slots: HashMap<TaskName, Slot> = graph
            .nodes()
            .map(|node| {
                (
                    node.name.clone(),
                    Slot {
                        state: TaskState::Pending,
                        remaining: node.deps.len(),
                    },
                )
            })
            .collect();

        Self {
            generation,
            policy,
            open: slots.len(),
            slots,
            failures: BTreeMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.slots.get(task).map(|s| s.state)
    }

    /// Current in-degree of a task.
    pub fn remaining_of(&self, task: &str) -> Option<usize> {
        self.slots.get(task).map(|s| s.remaining)
    }

    pub fn is_complete(&self) -> bool {
        self.open == 0
    }

    /// Names of tasks currently `Running`.
    pub fn running(&self) -> Vec<TaskName> {
        self.slots
            .iter()
            .filter(|(_, s)| s.state == TaskState::Running)
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Mark the initial ready set `Running` and return it.
    pub fn start(&mut self) -> Vec<TaskName> {
        let roots: Vec<TaskName> = self
            .slots
            .iter()
            .filter(|(_, s)| s.state == TaskState::Pending && s.remaining == 0)
            .map(|(n, _)| n.clone())
            .collect();

        for name in &roots {
            self.mark_running(name);
        }

        debug!(
            generation = self.generation,
            ready = ?roots,
            "initial ready set"
        );
        roots
    }

    /// Record the outcome of a `Running` task and compute what it unlocks.
    ///
    /// Completions for unknown tasks, or for tasks that are not `Running`,
    /// are ignored with a warning.
    pub fn complete(
        &mut self,
        graph: &TaskGraph,
        task: &str,
        outcome: &TaskOutcome,
    ) -> CompletionStep {
        let mut step = CompletionStep::default();

        match self.slots.get(task).map(|s| s.state) {
            Some(TaskState::Running) => {}
            Some(other) => {
                warn!(
                    task = %task,
                    generation = self.generation,
                    state = %other,
                    "completion for task that is not running; ignoring"
                );
                step.cycle_complete = self.is_complete();
                return step;
            }
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
                step.cycle_complete = self.is_complete();
                return step;
            }
        }

        match outcome {
            TaskOutcome::Success => {
                self.set_state(task, TaskState::Succeeded);
                for dependent in graph.dependents_of(task) {
                    let Some(slot) = self.slots.get_mut(dependent) else {
                        continue;
                    };
                    slot.remaining = slot.remaining.saturating_sub(1);
                    if slot.remaining == 0 && slot.state == TaskState::Pending {
                        step.newly_ready.push(dependent.clone());
                    }
                }
                for name in &step.newly_ready {
                    self.mark_running(name);
                }
            }
            TaskOutcome::Failed { reason, panicked } => {
                self.set_state(task, TaskState::Failed);
                self.failures.insert(task.to_string(), reason.clone());
                warn!(
                    task = %task,
                    generation = self.generation,
                    panicked,
                    reason = %reason,
                    "task failed; skipping its dependents in this cycle"
                );
                step.newly_skipped = self.skip_dependents(graph, task);
                if self.policy == FailurePolicy::FailFast {
                    step.newly_skipped.extend(self.skip_all_pending());
                }
            }
        }

        step.cycle_complete = self.is_complete();
        if step.cycle_complete {
            info!(generation = self.generation, "all tasks terminal; cycle finished");
        }
        step
    }

    /// Snapshot the per-task states into a report.
    pub fn report(&self, elapsed: Duration) -> CycleReport {
        let states = self
            .slots
            .iter()
            .map(|(name, slot)| (name.clone(), slot.state))
            .collect();
        CycleReport::new(self.generation, states, self.failures.clone(), elapsed)
    }

    fn mark_running(&mut self, task: &str) {
        debug!(
            task = %task,
            generation = self.generation,
            "dependencies satisfied; marking Running"
        );
        self.set_state(task, TaskState::Running);
    }

    fn set_state(&mut self, task: &str, state: TaskState) {
        if let Some(slot) = self.slots.get_mut(task) {
            if !slot.state.is_terminal() && state.is_terminal() {
                self.open -= 1;
            }
            slot.state = state;
        }
    }

    /// Mark every `Pending` transitive dependent of `failed` as `Skipped`.
    fn skip_dependents(&mut self, graph: &TaskGraph, failed: &str) -> Vec<TaskName> {
        let mut stack: Vec<&TaskName> = graph.dependents_of(failed).iter().collect();
        let mut skipped = Vec::new();

        while let Some(name) = stack.pop() {
            if self.state_of(name) != Some(TaskState::Pending) {
                continue;
            }
            self.set_state(name, TaskState::Skipped);
            debug!(
                task = %name,
                upstream = %failed,
                "marking dependent Skipped due to upstream failure"
            );
            skipped.push(name.clone());
            stack.extend(graph.dependents_of(name));
        }

        skipped
    }

    fn skip_all_pending(&mut self) -> Vec<TaskName> {
        let pending: Vec<TaskName> = self
            .slots
            .iter()
            .filter(|(_, s)| s.state == TaskState::Pending)
            .map(|(n, _)| n.clone())
            .collect();
        for name in &pending {
            self.set_state(name, TaskState::Skipped);
        }
        if !pending.is_empty() {
            info!(
                generation = self.generation,
                skipped = pending.len(),
                "fail-fast: not starting remaining tasks in this cycle"
            );
        }
        pending
    }
}
