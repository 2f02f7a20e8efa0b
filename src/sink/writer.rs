// src/sink/writer.rs

//! Destinations for drained log entries.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use super::LogEntry;

/// Where the sink consumer forwards entries. Called only from the consumer
/// thread, so implementations need no internal locking of their own.
pub trait LogWriter: Send + 'static {
    fn write_entry(&mut self, entry: &LogEntry);

    /// Called after each drained batch.
    fn flush(&mut self) {}
}

/// Prints one line per entry to stdout.
#[derive(Debug, Default)]
pub struct StdoutWriter;

impl LogWriter for StdoutWriter {
    fn write_entry(&mut self, entry: &LogEntry) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{entry}") {
            warn!(error = %e, "failed to write log entry to stdout");
        }
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }
}

/// Collects entries in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far, in consumption order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogWriter for MemoryWriter {
    fn write_entry(&mut self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}
