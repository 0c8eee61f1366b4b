//! Task and TaskResult types.

use crate::{ResultStatus, TaskError, TaskId, WorkerId};
use std::fmt;
use std::time::Duration;

type Compute = Box<dyn FnOnce() -> Result<f64, TaskError> + Send>;

/// A Task is one independent unit of CPU work.
///
/// The id is fixed when the task is built, so a batch created in a loop
/// never shares a loop variable between its tasks. Executing a task consumes
/// it.
pub struct Task {
    id: TaskId,
    compute: Compute,
}

impl Task {
    /// Create a new Task bound to the given computation.
    pub fn new<F>(id: impl Into<TaskId>, compute: F) -> Self
    where
        F: FnOnce() -> Result<f64, TaskError> + Send + 'static,
    {
        Self {
            id: id.into(),
            compute: Box::new(compute),
        }
    }

    /// Create a Task whose computation cannot fail.
    pub fn infallible<F>(id: impl Into<TaskId>, compute: F) -> Self
    where
        F: FnOnce() -> f64 + Send + 'static,
    {
        Self::new(id, move || Ok(compute()))
    }

    /// Get the task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Run the computation to completion on the current thread.
    pub fn execute(self) -> Result<f64, TaskError> {
        (self.compute)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}

/// The outcome of executing exactly one Task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    /// Task this result belongs to.
    pub task_id: TaskId,

    /// Worker that executed the task.
    pub worker: WorkerId,

    /// Wall time spent inside the computation.
    pub elapsed: Duration,

    /// Value on success, error on failure.
    pub outcome: Result<f64, TaskError>,
}

impl TaskResult {
    /// Create a new TaskResult.
    pub fn new(
        task_id: TaskId,
        worker: WorkerId,
        elapsed: Duration,
        outcome: Result<f64, TaskError>,
    ) -> Self {
        Self {
            task_id,
            worker,
            elapsed,
            outcome,
        }
    }

    /// The value, if the task succeeded.
    pub fn value(&self) -> Option<f64> {
        self.outcome.as_ref().ok().copied()
    }

    /// The error, if the task failed.
    pub fn error(&self) -> Option<&TaskError> {
        self.outcome.as_ref().err()
    }

    /// Succeeded or Failed.
    pub fn status(&self) -> ResultStatus {
        match self.outcome {
            Ok(_) => ResultStatus::Succeeded,
            Err(_) => ResultStatus::Failed,
        }
    }

    /// Check if the task produced a value.
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}
