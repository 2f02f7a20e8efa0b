// src/dag/validate.rs

//! Structural validation of a [`TaskGraph`] before a cycle starts.

use std::collections::HashMap;

use crate::dag::{TaskGraph, TaskName};
use crate::errors::{DagrunError, Result};

/// DFS colouring: white = unvisited, gray = on the current path,
/// black = fully explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

pub(crate) fn validate_graph(graph: &TaskGraph) -> Result<()> {
    // Sorted so the reported error does not depend on hash order.
    let mut names: Vec<&str> = graph.tasks().collect();
    names.sort_unstable();

    validate_dependencies(graph, &names)?;
    detect_cycle(graph, &names)
}

fn validate_dependencies(graph: &TaskGraph, names: &[&str]) -> Result<()> {
    for &name in names {
        for dep in graph.dependencies_of(name) {
            if !graph.contains(dep) {
                return Err(DagrunError::UnknownDependency {
                    task: name.to_string(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

fn detect_cycle(graph: &TaskGraph, names: &[&str]) -> Result<()> {
    let mut color: HashMap<&str, Color> = names.iter().map(|&n| (n, Color::White)).collect();

    for &start in names {
        if color[start] != Color::White {
            continue;
        }

        // Iterative DFS; each frame is (task, index of next dependency to visit).
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        color.insert(start, Color::Gray);

        while let Some(frame) = stack.last_mut() {
            let (name, next) = *frame;
            let deps = graph.dependencies_of(name);

            if next == deps.len() {
                color.insert(name, Color::Black);
                stack.pop();
                continue;
            }
            frame.1 += 1;

            let dep = deps[next].as_str();
            match color[dep] {
                Color::White => {
                    color.insert(dep, Color::Gray);
                    stack.push((dep, 0));
                }
                Color::Gray => return Err(DagrunError::CycleDetected(cycle_path(&stack, dep))),
                Color::Black => {}
            }
        }
    }

    Ok(())
}

/// Extract the cycle from the DFS path, in dependency order, closing it with
/// the repeated task (e.g. `["A", "C", "B", "A"]`).
fn cycle_path(stack: &[(&str, usize)], reentered: &str) -> Vec<TaskName> {
    let start = stack
        .iter()
        .position(|(name, _)| *name == reentered)
        .unwrap_or(0);
    let mut path: Vec<TaskName> = stack[start..]
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    path.push(reentered.to_string());
    path
}
