//! Core domain errors.

use thiserror::Error;

/// Errors produced by a single task's computation.
///
/// These never cross the pool boundary as a failure of the whole run; they
/// are recorded in the [`TaskResult`](crate::TaskResult) of the task that
/// produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The computation returned an error.
    #[error("Task failed: {0}")]
    Failed(String),

    /// The computation panicked while running on a worker.
    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
