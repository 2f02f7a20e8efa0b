// tests/graph_validation.rs

use dagrun::errors::DagrunError;
use dagrun::{task_fn, DependencyExecutor, MemoryWriter, TaskGraph};
use dagrun_test_utils::builders::{test_options, GraphBuilder};
use dagrun_test_utils::init_tracing;
use dagrun_test_utils::probe::Probe;

#[test]
fn test_cycle_is_rejected_before_any_task_runs() {
    init_tracing();

    let probe = Probe::new();
    let graph = GraphBuilder::new(&probe)
        .task("A", &["C"])
        .task("B", &["A"])
        .task("C", &["B"])
        .task("free", &[])
        .build();
    let mem = MemoryWriter::new();
    let mut executor = DependencyExecutor::with_writer(test_options(2), mem.clone())
        .expect("executor");

    match executor.run_cycle(&graph) {
        Err(DagrunError::CycleDetected(path)) => {
            assert_eq!(path.first(), path.last(), "path should be closed: {path:?}");
            for task in ["A", "B", "C"] {
                assert!(path.iter().any(|t| t == task), "{task} missing from {path:?}");
            }
            assert!(!path.iter().any(|t| t == "free"));
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }

    executor.shutdown();
    assert_eq!(probe.total_runs(), 0);
    assert!(mem.is_empty());
    // A rejected graph does not consume a generation.
    assert_eq!(executor.generation(), 0);
}

#[test]
fn test_unknown_dependency_names_the_missing_task() {
    let mut graph = TaskGraph::new();
    graph
        .register_task("X", ["Y"], task_fn(|| Ok(())))
        .unwrap();

    let err = graph.validate().unwrap_err();
    match &err {
        DagrunError::UnknownDependency { task, dependency } => {
            assert_eq!(task, "X");
            assert_eq!(dependency, "Y");
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("'Y'"));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut graph = TaskGraph::new();
    graph
        .register_task("A", Vec::<String>::new(), task_fn(|| Ok(())))
        .unwrap();

    let err = graph
        .register_task("A", ["B"], task_fn(|| Ok(())))
        .unwrap_err();
    assert!(matches!(err, DagrunError::DuplicateTask(ref name) if name == "A"));
    // The first registration is untouched.
    assert!(graph.dependencies_of("A").is_empty());
    assert_eq!(graph.len(), 1);
}

#[test]
fn test_self_dependency_is_reported_as_cycle() {
    let mut graph = TaskGraph::new();
    graph
        .register_task("loop", ["loop"], task_fn(|| Ok(())))
        .unwrap();

    match graph.validate() {
        Err(err @ DagrunError::CycleDetected(_)) => {
            assert_eq!(err.to_string(), "Cycle detected in task graph: loop -> loop");
            assert!(err.is_configuration_error());
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn test_topological_order_is_valid() {
    let mut graph = TaskGraph::new();
    graph.register_task("E", ["C", "D"], task_fn(|| Ok(()))).unwrap();
    graph.register_task("D", ["C"], task_fn(|| Ok(()))).unwrap();
    graph.register_task("C", ["A", "B"], task_fn(|| Ok(()))).unwrap();
    graph.register_task("A", Vec::<String>::new(), task_fn(|| Ok(()))).unwrap();
    graph.register_task("B", Vec::<String>::new(), task_fn(|| Ok(()))).unwrap();

    let order = graph.topological_order().unwrap();
    assert_eq!(order.len(), 5);
    let pos = |t: &str| order.iter().position(|o| o == t).unwrap();
    for task in graph.tasks() {
        for dep in graph.dependencies_of(task) {
            assert!(pos(dep) < pos(task), "{dep} must come before {task}");
        }
    }
}
