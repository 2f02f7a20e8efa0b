//! Instrumented tasks for observing how the executor schedules work.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use dagrun::{Task, TaskContext};

/// What a probe task does when it runs.
#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Succeed,
    Sleep(Duration),
    Fail,
    Panic,
}

/// A start or finish observed by a [`Probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started { task: String, generation: u64 },
    Finished { task: String, generation: u64 },
}

#[derive(Debug, Default)]
struct Inner {
    /// (generation, task) pairs whose body returned successfully.
    succeeded: Mutex<HashSet<(u64, String)>>,
    events: Mutex<Vec<Event>>,
    runs: Mutex<HashMap<String, usize>>,
    /// Starts observed before every dependency had succeeded.
    violations: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

/// Shared recorder; clone it into every task of a graph.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    inner: Arc<Inner>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task that checks, when it starts, that all of `deps` already
    /// succeeded in the same cycle.
    pub fn task(&self, deps: &[&str], behaviour: Behaviour) -> ProbeTask {
        ProbeTask {
            probe: self.clone(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            behaviour,
        }
    }

    pub fn violations(&self) -> usize {
        self.inner.violations.load(Ordering::SeqCst)
    }

    /// Highest number of probe tasks observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.events.lock().unwrap().clone()
    }

    /// How many times `task` ran across all cycles.
    pub fn runs_of(&self, task: &str) -> usize {
        self.inner.runs.lock().unwrap().get(task).copied().unwrap_or(0)
    }

    pub fn total_runs(&self) -> usize {
        self.inner.runs.lock().unwrap().values().sum()
    }

    /// Task names in start order for one cycle.
    pub fn start_order(&self, generation: u64) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started { task, generation: g } if g == generation => Some(task),
                _ => None,
            })
            .collect()
    }

    fn on_start(&self, ctx: &TaskContext<'_>, deps: &[String]) {
        let generation = ctx.generation();
        {
            let succeeded = self.inner.succeeded.lock().unwrap();
            if deps
                .iter()
                .any(|d| !succeeded.contains(&(generation, d.clone())))
            {
                self.inner.violations.fetch_add(1, Ordering::SeqCst);
            }
        }

        let now = self.inner.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);

        *self
            .inner
            .runs
            .lock()
            .unwrap()
            .entry(ctx.name().to_string())
            .or_default() += 1;
        self.inner.events.lock().unwrap().push(Event::Started {
            task: ctx.name().to_string(),
            generation,
        });
    }

    fn on_finish(&self, ctx: &TaskContext<'_>, success: bool) {
        if success {
            self.inner
                .succeeded
                .lock()
                .unwrap()
                .insert((ctx.generation(), ctx.name().to_string()));
        }
        self.inner.events.lock().unwrap().push(Event::Finished {
            task: ctx.name().to_string(),
            generation: ctx.generation(),
        });
        self.inner.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Task produced by [`Probe::task`].
#[derive(Debug)]
pub struct ProbeTask {
    probe: Probe,
    deps: Vec<String>,
    behaviour: Behaviour,
}

impl Task for ProbeTask {
    fn run(&self, ctx: &TaskContext<'_>) -> Result<()> {
        self.probe.on_start(ctx, &self.deps);
        let started = Instant::now();

        match self.behaviour {
            Behaviour::Succeed => {}
            Behaviour::Sleep(d) => thread::sleep(d),
            Behaviour::Fail => {
                self.probe.on_finish(ctx, false);
                bail!("{} failed on purpose", ctx.name());
            }
            Behaviour::Panic => {
                self.probe.on_finish(ctx, false);
                panic!("{} panicked on purpose", ctx.name());
            }
        }

        tracing::debug!(task = %ctx.name(), elapsed = ?started.elapsed(), "probe task done");
        self.probe.on_finish(ctx, true);
        Ok(())
    }
}
