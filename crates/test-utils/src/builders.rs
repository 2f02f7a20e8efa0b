#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dagrun::{ExecutorOptions, FailurePolicy, SinkOptions, TaskGraph};

use crate::probe::{Behaviour, Probe};

/// Builder for probe-instrumented `TaskGraph`s.
///
/// Every task is a [`crate::probe::ProbeTask`] that knows its own
/// dependencies, so the probe can flag any task started too early.
pub struct GraphBuilder {
    probe: Probe,
    tasks: Vec<(String, Vec<String>, Behaviour)>,
}

impl GraphBuilder {
    pub fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
            tasks: Vec::new(),
        }
    }

    pub fn task(self, name: &str, deps: &[&str]) -> Self {
        self.task_with(name, deps, Behaviour::Succeed)
    }

    pub fn task_with(mut self, name: &str, deps: &[&str], behaviour: Behaviour) -> Self {
        self.tasks.push((
            name.to_string(),
            deps.iter().map(|d| d.to_string()).collect(),
            behaviour,
        ));
        self
    }

    /// Register in insertion order; panics on duplicate names.
    pub fn build(self) -> Arc<TaskGraph> {
        let mut graph = TaskGraph::new();
        for (name, deps, behaviour) in self.tasks {
            let dep_refs: Vec<&str> = deps.iter().map(String::as_str).collect();
            let task = self.probe.task(&dep_refs, behaviour);
            graph
                .register_task(name.clone(), deps.clone(), task)
                .unwrap_or_else(|e| panic!("failed to register '{name}': {e}"));
        }
        Arc::new(graph)
    }
}

/// The five-task graph used throughout the tests:
/// `A`, `B` roots; `C` after `A`,`B`; `D` after `C`; `E` after `C`,`D`.
pub fn diamond(probe: &Probe, behaviour: Behaviour) -> Arc<TaskGraph> {
    GraphBuilder::new(probe)
        .task_with("A", &[], behaviour)
        .task_with("B", &[], behaviour)
        .task_with("C", &["A", "B"], behaviour)
        .task_with("D", &["C"], behaviour)
        .task_with("E", &["C", "D"], behaviour)
        .build()
}

/// Executor options tuned for fast tests: short sink poll interval and a
/// short progress interval so slow cycles show up in debug logs.
pub fn test_options(workers: usize) -> ExecutorOptions {
    ExecutorOptions {
        workers,
        failure_policy: FailurePolicy::SkipDependents,
        sink: SinkOptions {
            poll_interval: Duration::from_millis(5),
            ..SinkOptions::default()
        },
        progress_interval: Duration::from_millis(500),
    }
}
