// src/pool/mod.rs

//! Fixed-size worker pool.
//!
//! N OS threads consume one shared FIFO queue of boxed closures. The queue is
//! a `crossbeam-channel` MPMC channel whose only `Sender` is owned by the
//! pool; shutting down drops that sender, so workers finish whatever is
//! already queued and then exit.
//!
//! - [`WorkerPool`] owns the threads and the queue lifecycle.
//! - [`PoolHandle`] is a cheap, cloneable submit-only view used by code that
//!   runs on the workers themselves (e.g. completion callbacks that submit
//!   newly ready tasks).

mod worker;

pub(crate) use worker::panic_message;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use tracing::{debug, info, warn};

use crate::errors::{DagrunError, Result};

/// Unit of work accepted by the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug)]
struct Shared {
    /// `None` once the pool is shut down.
    sender: RwLock<Option<Sender<Job>>>,
    panicked: Arc<AtomicUsize>,
}

impl Shared {
    fn submit(&self, job: Job) -> Result<()> {
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| DagrunError::PoolClosed),
            None => Err(DagrunError::PoolClosed),
        }
    }
}

/// Fixed set of worker threads consuming a shared FIFO queue.
#[derive(Debug)]
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `workers` threads named `dagrun-worker-<i>`.
    ///
    /// `workers` must be at least 1.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(DagrunError::ConfigError(
                "worker pool needs at least one worker (got 0)".to_string(),
            ));
        }

        let (tx, rx) = unbounded::<Job>();
        let panicked = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx = rx.clone();
            let panicked = Arc::clone(&panicked);
            let handle = thread::Builder::new()
                .name(format!("dagrun-worker-{id}"))
                .spawn(move || worker::worker_loop(id, rx, panicked))?;
            handles.push(handle);
        }

        info!(workers, "worker pool started");

        Ok(Self {
            shared: Arc::new(Shared {
                sender: RwLock::new(Some(tx)),
                panicked,
            }),
            workers: handles,
            size: workers,
        })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.size
    }

    /// Enqueue a job and return immediately.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit(Box::new(job))
    }

    /// Cloneable submit-only handle.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of jobs that panicked so far.
    pub fn panicked_jobs(&self) -> usize {
        self.shared.panicked.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting work, let queued jobs drain and join every worker.
    ///
    /// Calling this more than once is a no-op.
    pub fn shutdown(&mut self) {
        let sender = self
            .shared
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if sender.is_none() && self.workers.is_empty() {
            return;
        }
        // Dropping the only sender closes the queue.
        drop(sender);

        debug!(workers = self.workers.len(), "worker pool draining");
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(worker = %name, "worker thread terminated abnormally");
            }
        }
        info!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Submit-only handle to a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit(Box::new(job))
    }
}
