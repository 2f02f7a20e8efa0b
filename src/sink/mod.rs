// src/sink/mod.rs

//! Asynchronous completion log.
//!
//! Tasks finish on worker threads and hand a [`LogEntry`] to the sink
//! without waiting for it to be written. A single consumer thread
//! (`dagrun-log-sink`) waits for entries with a bounded timeout, drains
//! everything available on each wake and forwards it to a [`LogWriter`].
//!
//! Overflow policy ([`SinkOverflow`]):
//! - `Unbounded` (default): the queue grows as needed, no entry is lost.
//! - `DropOldest { capacity }`: the queue holds at most `capacity` entries;
//!   when full, the oldest queued entry is evicted so that producers never
//!   block. Evictions are counted and reported at warn level.

mod writer;

pub use writer::{LogWriter, MemoryWriter, StdoutWriter};

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};
use tracing::{debug, info, warn};

use crate::dag::{TaskName, TaskState};
use crate::errors::Result;

/// Immutable record of one completed task invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    task: TaskName,
    generation: u64,
    state: TaskState,
    message: String,
    thread: String,
    elapsed: Duration,
    timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Stamp an entry with the current time and the calling thread's name.
    pub fn new(
        task: impl Into<TaskName>,
        generation: u64,
        state: TaskState,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let thread = thread::current()
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:?}", thread::current().id()));

        Self {
            task: task.into(),
            generation,
            state,
            message: message.into(),
            thread,
            elapsed,
            timestamp: Utc::now(),
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the thread that produced the entry.
    pub fn thread(&self) -> &str {
        &self.thread
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [cycle {}] {} {} on {} in {}ms",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.generation,
            self.task,
            self.state,
            self.thread,
            self.elapsed.as_millis(),
        )?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Queue bound behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkOverflow {
    #[default]
    Unbounded,
    DropOldest { capacity: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct SinkOptions {
    /// Upper bound on how long the consumer sleeps before re-checking the
    /// shutdown flag.
    pub poll_interval: Duration,
    pub overflow: SinkOverflow,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            overflow: SinkOverflow::Unbounded,
        }
    }
}

/// Cloneable producer side of an [`AsyncLogSink`].
#[derive(Debug, Clone)]
pub struct SinkSender {
    tx: Sender<LogEntry>,
    /// Present only for `DropOldest`: used to evict from the front.
    evict: Option<Receiver<LogEntry>>,
    /// Held for reading while an entry is accepted, for writing while
    /// shutdown flips it; an accepted entry is always queued before the
    /// consumer can observe the flag.
    closed: Arc<RwLock<bool>>,
    dropped: Arc<AtomicUsize>,
    discarded: Arc<AtomicUsize>,
}

impl SinkSender {
    /// Queue an entry. Never blocks on the consumer.
    ///
    /// Entries offered after shutdown are discarded with a warning.
    pub fn enqueue(&self, entry: LogEntry) {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            warn!(task = %entry.task, "log sink is shut down; discarding entry");
            return;
        }

        let mut entry = entry;
        loop {
            match self.tx.try_send(entry) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if let Some(rx) = &self.evict {
                        if let Ok(old) = rx.try_recv() {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                task = %old.task,
                                generation = old.generation,
                                "log sink full; dropped oldest entry"
                            );
                        }
                    }
                    entry = back;
                }
                Err(TrySendError::Disconnected(back)) => {
                    self.discarded.fetch_add(1, Ordering::Relaxed);
                    warn!(task = %back.task, "log sink consumer is gone; discarding entry");
                    return;
                }
            }
        }
    }
}

/// Single-consumer asynchronous log of task completions.
#[derive(Debug)]
pub struct AsyncLogSink {
    sender: SinkSender,
    consumer: Option<JoinHandle<()>>,
}

impl AsyncLogSink {
    /// Spawn the consumer thread.
    pub fn new(options: SinkOptions, writer: Box<dyn LogWriter>) -> Result<Self> {
        let (tx, rx, evict) = match options.overflow {
            SinkOverflow::Unbounded => {
                let (tx, rx) = unbounded();
                (tx, rx, None)
            }
            SinkOverflow::DropOldest { capacity } => {
                let (tx, rx) = bounded(capacity.max(1));
                let evict = rx.clone();
                (tx, rx, Some(evict))
            }
        };

        let closed = Arc::new(RwLock::new(false));
        let poll = options.poll_interval.max(Duration::from_millis(1));
        let consumer = {
            let closed = Arc::clone(&closed);
            thread::Builder::new()
                .name("dagrun-log-sink".to_string())
                .spawn(move || consume(rx, writer, closed, poll))?
        };

        debug!(?options, "log sink started");

        Ok(Self {
            sender: SinkSender {
                tx,
                evict,
                closed,
                dropped: Arc::new(AtomicUsize::new(0)),
                discarded: Arc::new(AtomicUsize::new(0)),
            },
            consumer: Some(consumer),
        })
    }

    pub fn sender(&self) -> SinkSender {
        self.sender.clone()
    }

    pub fn enqueue(&self, entry: LogEntry) {
        self.sender.enqueue(entry);
    }

    /// Entries evicted by the `DropOldest` policy.
    pub fn dropped(&self) -> usize {
        self.sender.dropped.load(Ordering::Relaxed)
    }

    /// Entries refused because the sink was already shut down.
    pub fn discarded(&self) -> usize {
        self.sender.discarded.load(Ordering::Relaxed)
    }

    /// Stop accepting entries, wait for the consumer to write out what is
    /// queued, and join it. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(consumer) = self.consumer.take() else {
            return;
        };
        *self
            .sender
            .closed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = true;
        if consumer.join().is_err() {
            warn!("log sink consumer terminated abnormally");
        }
        info!(
            dropped = self.dropped(),
            discarded = self.discarded(),
            "log sink shut down"
        );
    }
}

impl Drop for AsyncLogSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn consume(
    rx: Receiver<LogEntry>,
    mut writer: Box<dyn LogWriter>,
    closed: Arc<RwLock<bool>>,
    poll: Duration,
) {
    loop {
        match rx.recv_timeout(poll) {
            Ok(first) => {
                writer.write_entry(&first);
                drain(&rx, writer.as_mut());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if *closed.read().unwrap_or_else(PoisonError::into_inner) {
            // Catch anything enqueued right before the flag flipped.
            drain(&rx, writer.as_mut());
            break;
        }
    }
    writer.flush();
}

fn drain(rx: &Receiver<LogEntry>, writer: &mut dyn LogWriter) {
    for entry in rx.try_iter() {
        writer.write_entry(&entry);
    }
    writer.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(task: &str) -> LogEntry {
        LogEntry::new(task, 1, TaskState::Succeeded, "", Duration::ZERO)
    }

    #[test]
    fn every_entry_reaches_writer_by_shutdown() {
        let mem = MemoryWriter::new();
        let mut sink = AsyncLogSink::new(SinkOptions::default(), Box::new(mem.clone())).unwrap();

        let tx = sink.sender();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        tx.enqueue(entry(&format!("p{p}-{i}")));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        sink.shutdown();

        assert_eq!(mem.len(), 200);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn enqueue_after_shutdown_is_discarded() {
        let mem = MemoryWriter::new();
        let mut sink = AsyncLogSink::new(SinkOptions::default(), Box::new(mem.clone())).unwrap();
        sink.shutdown();
        sink.shutdown();
        sink.enqueue(entry("late"));
        assert!(mem.is_empty());
        assert_eq!(sink.discarded(), 1);
    }

    #[test]
    fn entries_racing_shutdown_are_written_or_counted() {
        let mem = MemoryWriter::new();
        let options = SinkOptions {
            poll_interval: Duration::from_millis(1),
            ..SinkOptions::default()
        };
        let mut sink = AsyncLogSink::new(options, Box::new(mem.clone())).unwrap();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let tx = sink.sender();
                thread::spawn(move || {
                    for i in 0..500 {
                        tx.enqueue(entry(&format!("p{p}-{i}")));
                    }
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(2));
        sink.shutdown();
        for p in producers {
            p.join().unwrap();
        }

        // Every entry is either written or refused with a count; none vanish.
        assert_eq!(mem.len() + sink.discarded(), 2000);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn display_contains_task_and_state() {
        let e = LogEntry::new("build", 2, TaskState::Failed, "exit 3", Duration::from_millis(5));
        let line = e.to_string();
        assert!(line.contains("[cycle 2] build failed"));
        assert!(line.ends_with("in 5ms: exit 3"));
    }
}
