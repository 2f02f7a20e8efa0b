// src/pool/worker.rs

//! Worker thread loop.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::Receiver;
use tracing::{debug, error, trace};

use super::Job;

/// Receive and run jobs until the queue is closed and empty.
///
/// A panicking job is caught here so the thread keeps serving the pool.
pub(crate) fn worker_loop(id: usize, rx: Receiver<Job>, panicked: Arc<AtomicUsize>) {
    debug!(worker = id, "worker started");

    // `recv` keeps yielding buffered jobs after the sender is dropped and
    // only errors once the queue is drained.
    while let Ok(job) = rx.recv() {
        trace!(worker = id, "worker picked up job");
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            panicked.fetch_add(1, Ordering::Relaxed);
            error!(
                worker = id,
                panic = %panic_message(payload.as_ref()),
                "job panicked; worker continues"
            );
        }
    }

    debug!(worker = id, "worker exiting (queue closed and drained)");
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
