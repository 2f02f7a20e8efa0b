// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::task::{Task, TaskNode};
use crate::dag::TaskName;
use crate::errors::{DagrunError, Result};

/// In-memory task graph keyed by task name.
///
/// Tasks are registered one at a time; a dependency may name a task that is
/// registered later. Nothing is checked about the edges until
/// [`TaskGraph::validate`], which every cycle runs before starting any work.
///
/// The dependents adjacency (reverse edges) is maintained on registration so
/// that completion fan-out does not have to scan the whole graph.
#[derive(Debug, Default)]
pub struct TaskGraph {
    nodes: HashMap<TaskName, TaskNode>,
    /// dependency name -> tasks that list it in their dependencies.
    dependents: HashMap<TaskName, Vec<TaskName>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with its prerequisite task names.
    ///
    /// Duplicate names in `deps` are collapsed. Fails with
    /// [`DagrunError::DuplicateTask`] if `name` is already registered.
    pub fn register_task<I, S>(
        &mut self,
        name: impl Into<TaskName>,
        deps: I,
        task: impl Task + 'static,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(DagrunError::DuplicateTask(name));
        }

        let mut unique: Vec<TaskName> = Vec::new();
        for dep in deps {
            let dep = dep.into();
            if !unique.contains(&dep) {
                unique.push(dep);
            }
        }

        for dep in &unique {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .push(name.clone());
        }

        debug!(task = %name, deps = ?unique, "registered task");

        self.nodes.insert(
            name.clone(),
            TaskNode {
                name,
                deps: unique,
                task: Box::new(task),
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Return all task names (unspecified order).
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.get(name)
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one as a dependency).
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.dependents
            .get(name)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Check that every dependency is registered and that there are no cycles.
    pub fn validate(&self) -> Result<()> {
        crate::dag::validate::validate_graph(self)
    }

    /// One valid execution order, dependencies first.
    ///
    /// Validates the graph first so that a broken graph yields the same
    /// structured error as a run would.
    pub fn topological_order(&self) -> Result<Vec<TaskName>> {
        self.validate()?;

        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.nodes.keys() {
            graph.add_node(name.as_str());
        }
        for node in self.nodes.values() {
            for dep in &node.deps {
                graph.add_edge(dep.as_str(), node.name.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
            // validate() already rejected cycles.
            Err(cycle) => Err(DagrunError::CycleDetected(vec![cycle.node_id().to_string()])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::task_fn;

    fn noop() -> impl Task {
        task_fn(|| Ok(()))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut g = TaskGraph::new();
        g.register_task("A", Vec::<String>::new(), noop()).unwrap();
        let err = g.register_task("A", ["B"], noop()).unwrap_err();
        assert!(matches!(err, DagrunError::DuplicateTask(ref n) if n == "A"));
        assert_eq!(g.len(), 1);
        assert!(g.dependents_of("B").is_empty());
    }

    #[test]
    fn adjacency_is_built_both_ways() {
        let mut g = TaskGraph::new();
        g.register_task("C", ["A", "B", "A"], noop()).unwrap();
        g.register_task("A", Vec::<String>::new(), noop()).unwrap();
        g.register_task("B", Vec::<String>::new(), noop()).unwrap();

        assert_eq!(g.dependencies_of("C"), ["A".to_string(), "B".to_string()]);
        assert_eq!(g.dependents_of("A"), ["C".to_string()]);
        assert_eq!(g.dependents_of("B"), ["C".to_string()]);
        assert!(g.dependents_of("C").is_empty());
    }

    #[test]
    fn topological_order_respects_edges() {
        let mut g = TaskGraph::new();
        g.register_task("E", ["C", "D"], noop()).unwrap();
        g.register_task("D", ["C"], noop()).unwrap();
        g.register_task("C", ["A", "B"], noop()).unwrap();
        g.register_task("B", Vec::<String>::new(), noop()).unwrap();
        g.register_task("A", Vec::<String>::new(), noop()).unwrap();

        let order = g.topological_order().unwrap();
        assert_eq!(order.len(), 5);
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        for name in g.tasks() {
            for dep in g.dependencies_of(name) {
                assert!(pos(dep) < pos(name), "{dep} must come before {name}");
            }
        }
    }
}
