//! JSON output for streaming run events as JSON lines.

use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use taskpool_core::{PoolEvent, PoolEventType, RunId, TaskId, TaskResult, WorkerId};
use tracing::warn;

use crate::{PoolObserver, RunSummary};

/// A JSON line written for each pool event.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: PoolEventType,
    pub timestamp: String,
    pub data: PoolEvent,
}

impl JsonEvent {
    /// Wrap a pool event with the current RFC 3339 timestamp.
    pub fn new(data: PoolEvent) -> Self {
        Self {
            event: data.event_type,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }
}

/// Writes every callback as one JSON object per line.
///
/// Task callbacks arrive from several workers at once; each line is written
/// under a lock so lines never interleave. A failed write is logged once;
/// later events keep being attempted.
pub struct JsonObserver<W: Write + Send> {
    out: Mutex<W>,
    write_failed: AtomicBool,
}

impl JsonObserver<io::Stdout> {
    /// Emit to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonObserver<W> {
    /// Emit to the given writer.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            write_failed: AtomicBool::new(false),
        }
    }

    /// Check if any event could not be serialized or written.
    pub fn write_failed(&self) -> bool {
        self.write_failed.load(Ordering::Relaxed)
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: PoolEvent) {
        let json = match serde_json::to_string(&JsonEvent::new(event)) {
            Ok(json) => json,
            Err(e) => return self.report_failure(&e),
        };
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(out, "{}", json).and_then(|_| out.flush()) {
            self.report_failure(&e);
        }
    }

    fn report_failure(&self, error: &dyn std::error::Error) {
        if !self.write_failed.swap(true, Ordering::Relaxed) {
            warn!(error = %error, "Failed to write JSON event; further failures are not logged");
        }
    }
}

impl<W: Write + Send> PoolObserver for JsonObserver<W> {
    fn on_run_start(&self, run_id: &RunId, worker_count: usize, submitted: usize) {
        self.emit(PoolEvent::run_started(run_id.clone(), worker_count, submitted));
    }

    fn on_task_start(&self, run_id: &RunId, task_id: TaskId, worker: WorkerId) {
        self.emit(PoolEvent::task_started(run_id.clone(), task_id, worker));
    }

    fn on_task_end(&self, run_id: &RunId, result: &TaskResult) {
        self.emit(PoolEvent::task_finished(run_id.clone(), result));
    }

    fn on_run_summary(&self, summary: &RunSummary) {
        self.emit(PoolEvent::run_finished(
            summary.run_id.clone(),
            summary.succeeded,
            summary.failed,
            summary.sum,
            summary.elapsed.as_millis(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use taskpool_core::TaskError;

    #[test]
    fn test_one_line_per_event() {
        let observer = JsonObserver::new(Vec::new());
        let run_id = RunId::new("run-1");

        observer.on_run_start(&run_id, 4, 2);
        observer.on_task_end(
            &run_id,
            &TaskResult::new(
                TaskId::new(3),
                WorkerId::new(0),
                Duration::from_millis(1),
                Err(TaskError::failed("boom")),
            ),
        );

        let output = String::from_utf8(observer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "run_started");
        assert_eq!(first["data"]["run_id"], "run-1");
        assert_eq!(first["data"]["metadata"]["worker_count"], "4");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "task_failed");
        assert_eq!(second["data"]["task_id"], 3);
        assert_eq!(second["data"]["metadata"]["error"], "Task failed: boom");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_errors_are_flagged_not_fatal() {
        let observer = JsonObserver::new(BrokenPipe);
        let run_id = RunId::new("run-2");
        assert!(!observer.write_failed());

        observer.on_run_start(&run_id, 1, 1);
        observer.on_task_start(&run_id, TaskId::new(0), WorkerId::new(0));

        assert!(observer.write_failed());
    }
}
