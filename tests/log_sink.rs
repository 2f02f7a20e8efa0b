// tests/log_sink.rs

use std::collections::HashSet;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use dagrun::{
    AsyncLogSink, DependencyExecutor, LogEntry, LogWriter, MemoryWriter, SinkOptions,
    SinkOverflow, TaskState,
};
use dagrun_test_utils::builders::{diamond, test_options, GraphBuilder};
use dagrun_test_utils::init_tracing;
use dagrun_test_utils::probe::{Behaviour, Probe};
use dagrun_test_utils::with_timeout;

fn entry(task: &str) -> LogEntry {
    LogEntry::new(task, 1, TaskState::Succeeded, "", Duration::ZERO)
}

/// Writer that blocks on its first entry until the test opens the gate.
struct GateWriter {
    inner: MemoryWriter,
    started: Sender<()>,
    gate: Receiver<()>,
    opened: bool,
}

impl LogWriter for GateWriter {
    fn write_entry(&mut self, entry: &LogEntry) {
        if !self.opened {
            let _ = self.started.send(());
            let _ = self.gate.recv();
            self.opened = true;
        }
        self.inner.write_entry(entry);
    }
}

#[test]
fn test_drop_oldest_evicts_front_of_queue() {
    init_tracing();

    let (mem, dropped) = with_timeout(|| {
        let mem = MemoryWriter::new();
        let (started_tx, started_rx) = bounded(1);
        let (gate_tx, gate_rx) = bounded(1);
        let writer = GateWriter {
            inner: mem.clone(),
            started: started_tx,
            gate: gate_rx,
            opened: false,
        };
        let options = SinkOptions {
            poll_interval: Duration::from_millis(5),
            overflow: SinkOverflow::DropOldest { capacity: 2 },
        };
        let mut sink = AsyncLogSink::new(options, Box::new(writer)).expect("sink");

        sink.enqueue(entry("e0"));
        // Consumer now holds e0 and is parked in the writer.
        started_rx.recv().expect("consumer started");

        for i in 1..=5 {
            sink.enqueue(entry(&format!("e{i}")));
        }
        gate_tx.send(()).expect("open gate");
        sink.shutdown();
        (mem, sink.dropped())
    });

    let written: Vec<String> = mem.entries().iter().map(|e| e.task().to_string()).collect();
    assert_eq!(written, vec!["e0", "e4", "e5"]);
    assert_eq!(dropped, 3);
}

#[test]
fn test_one_entry_per_executed_task() {
    init_tracing();

    let entries = with_timeout(|| {
        let probe = Probe::new();
        let graph = diamond(&probe, Behaviour::Succeed);
        let mem = MemoryWriter::new();
        let mut executor =
            DependencyExecutor::with_writer(test_options(2), mem.clone()).expect("executor");
        executor.run_cycles(&graph, 2).expect("cycles");
        executor.shutdown();
        mem.entries()
    });

    assert_eq!(entries.len(), 10);
    let seen: HashSet<(u64, &str)> = entries
        .iter()
        .map(|e| (e.generation(), e.task()))
        .collect();
    assert_eq!(seen.len(), 10, "no duplicate entries per cycle");
    for entry in &entries {
        assert_eq!(entry.state(), TaskState::Succeeded);
        assert!(
            entry.thread().starts_with("dagrun-worker-"),
            "entry produced on {}",
            entry.thread()
        );
    }
}

#[test]
fn test_skipped_tasks_produce_no_entry() {
    init_tracing();

    let entries = with_timeout(|| {
        let probe = Probe::new();
        let graph = GraphBuilder::new(&probe)
            .task_with("A", &[], Behaviour::Fail)
            .task("B", &["A"])
            .build();
        let mem = MemoryWriter::new();
        let mut executor =
            DependencyExecutor::with_writer(test_options(1), mem.clone()).expect("executor");
        executor.run_cycle(&graph).expect("cycle");
        executor.shutdown();
        mem.entries()
    });

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].task(), "A");
    assert_eq!(entries[0].state(), TaskState::Failed);
    assert!(entries[0].message().contains("failed on purpose"));
}

#[test]
fn test_enqueue_does_not_wait_for_slow_writer() {
    init_tracing();

    struct SlowWriter(MemoryWriter);
    impl LogWriter for SlowWriter {
        fn write_entry(&mut self, entry: &LogEntry) {
            std::thread::sleep(Duration::from_millis(20));
            self.0.write_entry(entry);
        }
    }

    let mem = MemoryWriter::new();
    let mut sink =
        AsyncLogSink::new(SinkOptions::default(), Box::new(SlowWriter(mem.clone()))).unwrap();

    let started = std::time::Instant::now();
    for i in 0..20 {
        sink.enqueue(entry(&format!("e{i}")));
    }
    // Twenty writes take 400ms; queuing them must not.
    assert!(started.elapsed() < Duration::from_millis(200));

    sink.shutdown();
    assert_eq!(mem.len(), 20);
}
