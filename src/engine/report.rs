// src/engine/report.rs

//! Per-cycle and per-run reports returned to the caller.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::dag::{TaskName, TaskState};

/// Terminal state of every task after one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    generation: u64,
    states: BTreeMap<TaskName, TaskState>,
    failures: BTreeMap<TaskName, String>,
    elapsed: Duration,
}

impl CycleReport {
    pub(crate) fn new(
        generation: u64,
        states: BTreeMap<TaskName, TaskState>,
        failures: BTreeMap<TaskName, String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            generation,
            states,
            failures,
            elapsed,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// `true` iff every task succeeded.
    pub fn success(&self) -> bool {
        self.states.values().all(|s| *s == TaskState::Succeeded)
    }

    pub fn states(&self) -> &BTreeMap<TaskName, TaskState> {
        &self.states
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.states.get(task).copied()
    }

    /// Error message recorded for a failed task.
    pub fn failure_of(&self, task: &str) -> Option<&str> {
        self.failures.get(task).map(String::as_str)
    }

    pub fn tasks_in(&self, state: TaskState) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }
}

/// Reports for every cycle of a multi-cycle run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    cycles: Vec<CycleReport>,
    stopped_early: bool,
}

impl RunReport {
    pub(crate) fn push(&mut self, cycle: CycleReport) {
        self.cycles.push(cycle);
    }

    pub(crate) fn mark_stopped_early(&mut self) {
        self.stopped_early = true;
    }

    pub fn cycles(&self) -> &[CycleReport] {
        &self.cycles
    }

    /// `true` iff every executed cycle succeeded.
    pub fn success(&self) -> bool {
        self.cycles.iter().all(CycleReport::success)
    }

    /// A stop was requested before all requested cycles ran.
    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(states: &[(&str, TaskState)]) -> CycleReport {
        CycleReport::new(
            1,
            states.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            BTreeMap::new(),
            Duration::ZERO,
        )
    }

    #[test]
    fn success_requires_all_succeeded() {
        assert!(report(&[("A", TaskState::Succeeded)]).success());
        let r = report(&[("A", TaskState::Failed), ("B", TaskState::Skipped)]);
        assert!(!r.success());
        assert_eq!(r.tasks_in(TaskState::Skipped), vec!["B"]);
        assert_eq!(r.count(TaskState::Failed), 1);
    }

    #[test]
    fn run_report_aggregates_cycles() {
        let mut run = RunReport::default();
        assert!(run.success());
        run.push(report(&[("A", TaskState::Succeeded)]));
        run.push(report(&[("A", TaskState::Failed)]));
        assert!(!run.success());
        assert_eq!(run.cycles().len(), 2);
    }
}
