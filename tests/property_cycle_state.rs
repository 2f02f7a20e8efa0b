// tests/property_cycle_state.rs

use std::collections::HashSet;

use proptest::prelude::*;

use dagrun::dag::CycleState;
use dagrun::{task_fn, FailurePolicy, TaskGraph, TaskOutcome, TaskState};

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let mut deps: Vec<usize> = if i == 0 {
                        Vec::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    deps.sort_unstable();
                    deps.dedup();
                    deps
                })
                .collect()
        })
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn build(deps: &[Vec<usize>]) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for (i, d) in deps.iter().enumerate() {
        graph
            .register_task(name(i), d.iter().map(|&j| name(j)), task_fn(|| Ok(())))
            .unwrap();
    }
    graph
}

/// Drive one cycle to completion, picking the next finished task from the
/// running set with `picks`. Returns every task in start order.
fn simulate(
    graph: &TaskGraph,
    state: &mut CycleState,
    failing: &HashSet<usize>,
    picks: &[usize],
) -> Result<Vec<String>, TestCaseError> {
    let mut started: Vec<String> = Vec::new();
    let mut running: Vec<String> = state.start();
    let mut step = 0usize;

    while !running.is_empty() {
        for task in &running {
            if started.contains(task) {
                continue;
            }
            for dep in graph.dependencies_of(task) {
                prop_assert_eq!(
                    state.state_of(dep),
                    Some(TaskState::Succeeded),
                    "{} started before {} succeeded",
                    task,
                    dep
                );
            }
            started.push(task.clone());
        }

        let pick = picks.get(step).copied().unwrap_or(0) % running.len();
        step += 1;
        let task = running.swap_remove(pick);
        let index: usize = task["task_".len()..].parse().unwrap();
        let outcome = if failing.contains(&index) {
            TaskOutcome::failed("boom")
        } else {
            TaskOutcome::Success
        };

        let result = state.complete(graph, &task, &outcome);
        for ready in &result.newly_ready {
            prop_assert!(!started.contains(ready), "{} started twice", ready);
        }
        running.extend(result.newly_ready);
        prop_assert_eq!(result.cycle_complete, running.is_empty() && state.is_complete());

        prop_assert!(step <= graph.len(), "more completions than tasks");
    }

    Ok(started)
}

proptest! {
    #[test]
    fn prop_cycle_terminates_with_consistent_states(
        deps in dag_strategy(12),
        failing in proptest::collection::hash_set(0..12usize, 0..3),
        picks in proptest::collection::vec(any::<usize>(), 0..24),
        fail_fast in any::<bool>(),
    ) {
        let graph = build(&deps);
        let policy = if fail_fast { FailurePolicy::FailFast } else { FailurePolicy::SkipDependents };
        let mut state = CycleState::new(&graph, 1, policy);

        let started = simulate(&graph, &mut state, &failing, &picks)?;

        prop_assert!(state.is_complete());
        let any_failed = graph.tasks().any(|t| state.state_of(t) == Some(TaskState::Failed));

        for (i, d) in deps.iter().enumerate() {
            let task = name(i);
            let s = state.state_of(&task).unwrap();
            prop_assert!(s.is_terminal(), "{} left {}", task, s);

            match s {
                TaskState::Succeeded => {
                    prop_assert!(started.contains(&task));
                    prop_assert!(!failing.contains(&i));
                    for &j in d {
                        prop_assert_eq!(state.state_of(&name(j)), Some(TaskState::Succeeded));
                    }
                }
                TaskState::Failed => {
                    prop_assert!(started.contains(&task));
                    prop_assert!(failing.contains(&i));
                }
                TaskState::Skipped => {
                    prop_assert!(!started.contains(&task));
                    let upstream_broken = d.iter().any(|&j| {
                        matches!(
                            state.state_of(&name(j)),
                            Some(TaskState::Failed) | Some(TaskState::Skipped)
                        )
                    });
                    if fail_fast {
                        prop_assert!(any_failed);
                    } else {
                        prop_assert!(upstream_broken, "{} skipped without a broken dependency", task);
                    }
                }
                other => prop_assert!(false, "unexpected state {}", other),
            }
        }

        // Without failures every task runs exactly once.
        if !any_failed {
            prop_assert_eq!(started.len(), graph.len());
        }
    }
}
