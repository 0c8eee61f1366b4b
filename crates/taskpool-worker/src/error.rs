//! Pool-level errors.

use thiserror::Error;

/// Errors that stop a run before any task executes.
///
/// Failures of individual tasks are not pool errors; they are recorded in
/// the run's [`RunReport`](crate::RunReport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Invalid worker count {requested}: a pool needs at least one worker")]
    InvalidWorkerCount { requested: usize },
}
