// src/engine/mod.rs

//! Execution engine.
//!
//! [`DependencyExecutor`] drives cycles over a task graph: it validates the
//! graph, seeds the ready set, and lets completions running on the worker
//! pool submit dependents as their in-degree drops to zero. Results come back
//! as a [`CycleReport`] per cycle, or a [`RunReport`] for several cycles.

pub mod executor;
pub mod report;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::sink::SinkOptions;
use crate::types::FailurePolicy;

pub use executor::DependencyExecutor;
pub use report::{CycleReport, RunReport};

/// Options used to construct a [`DependencyExecutor`].
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Number of worker threads (>= 1).
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    pub sink: SinkOptions,
    /// How often the driver logs which tasks it is still waiting on.
    /// Must be non-zero.
    pub progress_interval: Duration,
}

impl ExecutorOptions {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2),
            failure_policy: FailurePolicy::default(),
            sink: SinkOptions::default(),
            progress_interval: Duration::from_secs(5),
        }
    }
}

/// Cooperative stop flag checked between cycles.
///
/// Requesting a stop never interrupts a running cycle; it only prevents the
/// next one from starting. The flag stays set once requested.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
