// src/engine/executor.rs

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::dag::{CycleState, TaskContext, TaskGraph, TaskName, TaskOutcome, TaskState};
use crate::engine::report::{CycleReport, RunReport};
use crate::engine::{ExecutorOptions, StopHandle};
use crate::errors::{DagrunError, Result};
use crate::pool::{panic_message, PoolHandle, WorkerPool};
use crate::sink::{AsyncLogSink, LogEntry, LogWriter, SinkSender, StdoutWriter};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs a [`TaskGraph`] cycle by cycle on a [`WorkerPool`].
///
/// Each cycle starts every task with no dependencies, then submits a task as
/// soon as its last dependency succeeds. Completion bookkeeping happens on the
/// worker that ran the task, so submission of a dependent never waits for an
/// unrelated branch. The calling thread only blocks until the cycle is done.
///
/// The executor owns the pool and the completion log sink; both are shut down
/// by [`DependencyExecutor::shutdown`] or on drop.
#[derive(Debug)]
pub struct DependencyExecutor {
    pool: WorkerPool,
    sink: AsyncLogSink,
    options: ExecutorOptions,
    generation: u64,
    stop: StopHandle,
}

impl DependencyExecutor {
    /// Executor whose completion log goes to stdout.
    pub fn new(options: ExecutorOptions) -> Result<Self> {
        Self::with_writer(options, StdoutWriter)
    }

    /// Executor whose completion log goes to `writer`.
    ///
    /// Fails with a configuration error if `options.progress_interval` is
    /// zero, since the driver's timed wait would never park.
    pub fn with_writer(options: ExecutorOptions, writer: impl LogWriter) -> Result<Self> {
        if options.progress_interval.is_zero() {
            return Err(DagrunError::ConfigError(
                "progress_interval must be greater than zero".to_string(),
            ));
        }
        let pool = WorkerPool::new(options.workers)?;
        let sink = AsyncLogSink::new(options.sink, Box::new(writer))?;
        Ok(Self {
            pool,
            sink,
            options,
            generation: 0,
            stop: StopHandle::default(),
        })
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Number of cycles started so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Handle for requesting a stop between cycles (e.g. from a signal handler).
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Log entries evicted by a bounded sink.
    pub fn dropped_log_entries(&self) -> usize {
        self.sink.dropped()
    }

    /// Execute every task of `graph` once.
    ///
    /// Returns a configuration error, without running anything, if the graph
    /// does not validate. Task failures are not errors: they show up in the
    /// report.
    pub fn run_cycle(&mut self, graph: &Arc<TaskGraph>) -> Result<CycleReport> {
        if self.pool.is_closed() {
            return Err(DagrunError::PoolClosed);
        }
        graph.validate()?;

        self.generation += 1;
        let generation = self.generation;
        let started = Instant::now();
        info!(generation, tasks = graph.len(), "starting cycle");

        let cycle = Arc::new(Cycle {
            graph: Arc::clone(graph),
            generation,
            state: Mutex::new(CycleState::new(graph, generation, self.options.failure_policy)),
            done: Condvar::new(),
            pool: self.pool.handle(),
            sink: self.sink.sender(),
        });

        let roots = lock(&cycle.state).start();
        cycle.submit(roots);

        let report = {
            let mut state = lock(&cycle.state);
            while !state.is_complete() {
                let (guard, waited) = cycle
                    .done
                    .wait_timeout(state, self.options.progress_interval)
                    .unwrap_or_else(PoisonError::into_inner);
                state = guard;
                if waited.timed_out() && !state.is_complete() {
                    debug!(
                        generation,
                        running = ?state.running(),
                        "cycle still waiting on running tasks"
                    );
                }
            }
            state.report(started.elapsed())
        };

        info!(
            generation,
            succeeded = report.count(TaskState::Succeeded),
            failed = report.count(TaskState::Failed),
            skipped = report.count(TaskState::Skipped),
            elapsed_ms = report.elapsed().as_millis() as u64,
            "cycle finished"
        );
        for task in report.tasks_in(TaskState::Skipped) {
            info!(generation, task = %task, "task skipped due to upstream failure");
        }

        Ok(report)
    }

    /// Run `cycles` consecutive cycles over the same graph; every cycle starts
    /// from fresh per-task state.
    ///
    /// A stop requested through [`StopHandle`] is honoured between cycles.
    pub fn run_cycles(&mut self, graph: &Arc<TaskGraph>, cycles: usize) -> Result<RunReport> {
        let mut run = RunReport::default();

        for i in 0..cycles {
            if self.stop.is_stop_requested() {
                warn!(
                    completed = i,
                    requested = cycles,
                    "stop requested; not starting further cycles"
                );
                run.mark_stopped_early();
                break;
            }
            run.push(self.run_cycle(graph)?);
        }

        Ok(run)
    }

    /// Stop the worker pool (draining queued work) and then the log sink.
    ///
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
        self.sink.shutdown();
    }
}

impl Drop for DependencyExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Everything shared between the driver and the jobs of one cycle.
struct Cycle {
    graph: Arc<TaskGraph>,
    generation: u64,
    state: Mutex<CycleState>,
    done: Condvar,
    pool: PoolHandle,
    sink: SinkSender,
}

impl Cycle {
    /// Submit tasks that were already marked `Running`.
    fn submit(self: &Arc<Self>, tasks: Vec<TaskName>) {
        for name in tasks {
            let cycle = Arc::clone(self);
            let job_name = name.clone();
            if let Err(e) = self.pool.submit(move || cycle.execute(&job_name)) {
                error!(
                    task = %name,
                    generation = self.generation,
                    error = %e,
                    "could not submit task; marking Failed"
                );
                self.finish(&name, TaskOutcome::failed(format!("submission failed: {e}")));
            }
        }
    }

    /// Job body: run the task, log the outcome, then record completion.
    fn execute(self: &Arc<Self>, name: &str) {
        let outcome = match self.graph.node(name) {
            Some(node) => {
                let ctx = TaskContext::new(name, self.generation);
                let started = Instant::now();
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| node.task().run(&ctx))) {
                    Ok(Ok(())) => TaskOutcome::Success,
                    Ok(Err(e)) => TaskOutcome::Failed {
                        reason: format!("{e:#}"),
                        panicked: false,
                    },
                    Err(payload) => TaskOutcome::Failed {
                        reason: format!("panicked: {}", panic_message(payload.as_ref())),
                        panicked: true,
                    },
                };
                self.log_completion(name, &outcome, started);
                outcome
            }
            None => TaskOutcome::failed(format!("task '{name}' is not in the graph")),
        };

        self.finish(name, outcome);
    }

    fn log_completion(&self, name: &str, outcome: &TaskOutcome, started: Instant) {
        let (state, message) = match outcome {
            TaskOutcome::Success => (TaskState::Succeeded, String::new()),
            TaskOutcome::Failed { reason, .. } => (TaskState::Failed, reason.clone()),
        };
        debug!(task = %name, generation = self.generation, %state, "task finished");
        self.sink.enqueue(LogEntry::new(
            name,
            self.generation,
            state,
            message,
            started.elapsed(),
        ));
    }

    /// Record a completion and submit whatever it made ready.
    fn finish(self: &Arc<Self>, name: &str, outcome: TaskOutcome) {
        let step = lock(&self.state).complete(&self.graph, name, &outcome);

        if step.cycle_complete {
            self.done.notify_all();
        }
        if !step.newly_ready.is_empty() {
            self.submit(step.newly_ready);
        }
    }
}
