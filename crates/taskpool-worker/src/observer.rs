//! Observability hooks for a run.
//!
//! The pool never writes logs on its own; it reports to a [`PoolObserver`]
//! handed to it at construction.

use std::sync::Mutex;

use taskpool_core::{PoolEvent, PoolEventType, RunId, TaskId, TaskResult, WorkerId};
use tracing::{error, info};

use crate::RunSummary;

/// Receives progress callbacks from a run.
///
/// Task callbacks are invoked on worker threads, concurrently.
pub trait PoolObserver: Send + Sync {
    /// Workers are about to start on a batch.
    fn on_run_start(&self, _run_id: &RunId, _worker_count: usize, _submitted: usize) {}

    /// A worker claimed a task.
    fn on_task_start(&self, _run_id: &RunId, _task_id: TaskId, _worker: WorkerId) {}

    /// A task finished, successfully or not.
    fn on_task_end(&self, _run_id: &RunId, _result: &TaskResult) {}

    /// Every task has reported.
    fn on_run_summary(&self, _summary: &RunSummary) {}
}

/// Discards every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PoolObserver for NoopObserver {}

/// Writes structured `tracing` lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PoolObserver for TracingObserver {
    fn on_run_start(&self, run_id: &RunId, worker_count: usize, submitted: usize) {
        info!(run_id = %run_id, worker_count, submitted, "Starting worker pool");
    }

    fn on_task_start(&self, run_id: &RunId, task_id: TaskId, worker: WorkerId) {
        info!(run_id = %run_id, task_id = %task_id, worker = %worker, "Task started");
    }

    fn on_task_end(&self, run_id: &RunId, result: &TaskResult) {
        let elapsed_ms = result.elapsed.as_secs_f64() * 1000.0;
        match &result.outcome {
            Ok(value) => info!(
                run_id = %run_id,
                task_id = %result.task_id,
                worker = %result.worker,
                elapsed_ms = format_args!("{:.2}", elapsed_ms),
                value = format_args!("{:.2}", value),
                "Task completed"
            ),
            Err(e) => error!(
                run_id = %run_id,
                task_id = %result.task_id,
                worker = %result.worker,
                elapsed_ms = format_args!("{:.2}", elapsed_ms),
                error = %e,
                "Task failed"
            ),
        }
    }

    fn on_run_summary(&self, summary: &RunSummary) {
        info!(
            run_id = %summary.run_id,
            worker_count = summary.worker_count,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_secs = format_args!("{:.2}", summary.elapsed.as_secs_f64()),
            sum = format_args!("{:.2}", summary.sum),
            "Run finished"
        );
    }
}

/// Captures every callback as a [`PoolEvent`], in the order received.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PoolEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<PoolEvent> {
        self.lock().clone()
    }

    /// Number of recorded events of the given type.
    pub fn count(&self, event_type: PoolEventType) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    fn push(&self, event: PoolEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PoolEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PoolObserver for RecordingObserver {
    fn on_run_start(&self, run_id: &RunId, worker_count: usize, submitted: usize) {
        self.push(PoolEvent::run_started(run_id.clone(), worker_count, submitted));
    }

    fn on_task_start(&self, run_id: &RunId, task_id: TaskId, worker: WorkerId) {
        self.push(PoolEvent::task_started(run_id.clone(), task_id, worker));
    }

    fn on_task_end(&self, run_id: &RunId, result: &TaskResult) {
        self.push(PoolEvent::task_finished(run_id.clone(), result));
    }

    fn on_run_summary(&self, summary: &RunSummary) {
        self.push(PoolEvent::run_finished(
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

    #[test]
    fn test_recording_observer_captures_events() {
        let observer = RecordingObserver::new();
        let run_id = RunId::generate();

        observer.on_run_start(&run_id, 2, 1);
        observer.on_task_start(&run_id, TaskId::new(0), WorkerId::new(1));
        observer.on_task_end(
            &run_id,
            &TaskResult::new(TaskId::new(0), WorkerId::new(1), Duration::ZERO, Ok(1.0)),
        );

        let events = observer.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, PoolEventType::RunStarted);
        assert_eq!(events[1].event_type, PoolEventType::TaskStarted);
        assert_eq!(events[2].event_type, PoolEventType::TaskCompleted);
        assert!(events.iter().all(|e| e.run_id == run_id));
        assert_eq!(observer.count(PoolEventType::TaskFailed), 0);
    }
}
