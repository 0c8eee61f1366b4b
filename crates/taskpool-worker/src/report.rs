//! Results of one run.

use std::time::Duration;

use taskpool_core::{RunId, TaskError, TaskId, TaskResult};

/// Everything a run produced, in completion order.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identifier of this run.
    pub run_id: RunId,

    /// Workers the run was allowed to use.
    pub worker_count: usize,

    /// Number of tasks submitted.
    pub submitted: usize,

    /// One result per submitted task, in the order they completed.
    pub results: Vec<TaskResult>,

    /// Wall time from the first enqueue to the last result.
    pub elapsed: Duration,
}

impl RunReport {
    /// Check that every submitted task reported exactly once.
    pub fn is_complete(&self) -> bool {
        self.results.len() == self.submitted
    }

    /// Values of the successful tasks, in completion order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.results.iter().filter_map(TaskResult::value)
    }

    /// Failed tasks and their errors.
    pub fn failures(&self) -> impl Iterator<Item = (TaskId, &TaskError)> + '_ {
        self.results
            .iter()
            .filter_map(|r| r.error().map(|e| (r.task_id, e)))
    }

    /// Number of tasks that returned a value.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of tasks that failed.
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Check if any task failed.
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.is_success())
    }

    /// Sum of all successful values.
    pub fn sum(&self) -> f64 {
        self.values().sum()
    }

    /// Result for a given task, if it reported.
    pub fn result_for(&self, task_id: TaskId) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.task_id == task_id)
    }

    /// Condense the report for logging.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            worker_count: self.worker_count,
            submitted: self.submitted,
            succeeded: self.succeeded(),
            failed: self.failed_count(),
            sum: self.sum(),
            elapsed: self.elapsed,
        }
    }
}

/// Aggregate numbers for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Run being summarized.
    pub run_id: RunId,
    /// Workers the run was allowed to use.
    pub worker_count: usize,
    /// Tasks submitted.
    pub submitted: usize,
    /// Tasks that returned a value.
    pub succeeded: usize,
    /// Tasks that returned an error or panicked.
    pub failed: usize,
    /// Sum of all successful values.
    pub sum: f64,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}
