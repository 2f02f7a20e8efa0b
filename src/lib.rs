// src/lib.rs

//! Dependency-aware concurrent task executor.
//!
//! Register named tasks and their prerequisites in a [`TaskGraph`], then let
//! a [`DependencyExecutor`] run the graph one or more cycles on a fixed
//! [`WorkerPool`]. Every task runs exactly once per cycle and never before
//! all of its prerequisites succeeded in that cycle; independent tasks run in
//! parallel. Completions are logged through an [`AsyncLogSink`] so a slow log
//! never holds up a worker.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dagrun::{task_fn, DependencyExecutor, ExecutorOptions, TaskGraph};
//!
//! # fn main() -> dagrun::errors::Result<()> {
//! let mut graph = TaskGraph::new();
//! graph.register_task("fetch", Vec::<String>::new(), task_fn(|| Ok(())))?;
//! graph.register_task("build", ["fetch"], task_fn(|| Ok(())))?;
//!
//! let mut executor = DependencyExecutor::new(ExecutorOptions::with_workers(2))?;
//! let report = executor.run_cycles(&Arc::new(graph), 2)?;
//! assert!(report.success());
//! executor.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pool;
pub mod sink;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use tracing::{info, warn};

pub use crate::dag::{task_fn, Task, TaskContext, TaskGraph, TaskName, TaskOutcome, TaskState};
pub use crate::engine::{CycleReport, DependencyExecutor, ExecutorOptions, RunReport, StopHandle};
pub use crate::pool::{PoolHandle, WorkerPool};
pub use crate::sink::{AsyncLogSink, LogEntry, LogWriter, MemoryWriter, SinkOptions, SinkOverflow};
pub use crate::types::FailurePolicy;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - CLI overrides
/// - the executor (worker pool + log sink)
/// - Ctrl-C handling (stop after the current cycle)
pub async fn run(args: CliArgs) -> Result<RunReport> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(RunReport::default());
    }

    let mut options = cfg.executor_options();
    if let Some(workers) = args.workers {
        ensure!(workers >= 1, "--workers must be >= 1 (got 0)");
        options.workers = workers;
    }
    if let Some(policy) = args.failure_policy {
        options.failure_policy = policy;
    }
    let cycles = args.cycles.unwrap_or(cfg.config.cycles);
    ensure!(cycles >= 1, "--cycles must be >= 1 (got 0)");

    let graph = Arc::new(cfg.build_graph()?);
    let mut executor = DependencyExecutor::new(options)?;
    info!(
        tasks = graph.len(),
        workers = options.workers,
        cycles,
        policy = ?options.failure_policy,
        "executor ready"
    );

    // Ctrl-C → stop after the current cycle.
    {
        let stop = executor.stop_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("Ctrl-C received; stopping after the current cycle");
            stop.request_stop();
        });
    }

    // Cycles block on OS threads; keep them off the async workers.
    let report = tokio::task::spawn_blocking(move || {
        let report = executor.run_cycles(&graph, cycles);
        executor.shutdown();
        report
    })
    .await
    .context("executor thread panicked")??;

    print_summary(&report);
    Ok(report)
}

/// Dry-run output: tasks, deps, commands and one valid execution order.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let graph = cfg.build_graph()?;
    let order = graph.topological_order()?;

    println!("dagrun dry-run");
    println!("  config.workers = {}", cfg.config.workers);
    println!("  config.cycles = {}", cfg.config.cycles);
    println!("  config.failure_policy = {:?}", cfg.config.failure_policy);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
    }
    println!();
    println!("execution order: {}", order.join(" -> "));
    Ok(())
}

fn print_summary(report: &RunReport) {
    for cycle in report.cycles() {
        println!(
            "cycle {}: {} ({} succeeded, {} failed, {} skipped) in {}ms",
            cycle.generation(),
            if cycle.success() { "ok" } else { "FAILED" },
            cycle.count(TaskState::Succeeded),
            cycle.count(TaskState::Failed),
            cycle.count(TaskState::Skipped),
            cycle.elapsed().as_millis(),
        );
        for task in cycle.tasks_in(TaskState::Failed) {
            println!(
                "  failed: {task}: {}",
                cycle.failure_of(task).unwrap_or("unknown error")
            );
        }
        for task in cycle.tasks_in(TaskState::Skipped) {
            println!("  skipped: {task}");
        }
    }
    if report.stopped_early() {
        println!("stopped early after {} cycle(s)", report.cycles().len());
    }
}
