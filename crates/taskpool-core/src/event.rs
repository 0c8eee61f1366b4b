//! Pool execution events for tracking a run as it progresses.

use crate::ids::{EventId, RunId, TaskId, WorkerId};
use crate::TaskResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A pool execution event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// Run this event belongs to.
    pub run_id: RunId,
    /// Task this event belongs to, if any.
    pub task_id: Option<TaskId>,
    /// Type of event.
    pub event_type: PoolEventType,
    /// Unix timestamp (milliseconds) when event occurred.
    pub timestamp_ms: i64,
    /// Event-specific metadata (worker, elapsed_ms, value, error, etc.).
    pub metadata: HashMap<String, String>,
}

impl PoolEvent {
    /// Create a new pool event.
    pub fn new(
        run_id: RunId,
        task_id: Option<TaskId>,
        event_type: PoolEventType,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            run_id,
            task_id,
            event_type,
            timestamp_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
            metadata,
        }
    }

    /// Create a RunStarted event.
    pub fn run_started(run_id: RunId, worker_count: usize, submitted: usize) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("worker_count".to_string(), worker_count.to_string());
        metadata.insert("submitted".to_string(), submitted.to_string());
        Self::new(run_id, None, PoolEventType::RunStarted, metadata)
    }

    /// Create a TaskStarted event.
    pub fn task_started(run_id: RunId, task_id: TaskId, worker: WorkerId) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("worker".to_string(), worker.index().to_string());
        Self::new(run_id, Some(task_id), PoolEventType::TaskStarted, metadata)
    }

    /// Create a TaskCompleted or TaskFailed event from a result.
    pub fn task_finished(run_id: RunId, result: &TaskResult) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("worker".to_string(), result.worker.index().to_string());
        metadata.insert(
            "elapsed_ms".to_string(),
            result.elapsed.as_millis().to_string(),
        );
        let event_type = match &result.outcome {
            Ok(value) => {
                metadata.insert("value".to_string(), value.to_string());
                PoolEventType::TaskCompleted
            }
            Err(e) => {
                metadata.insert("error".to_string(), e.to_string());
                PoolEventType::TaskFailed
            }
        };
        Self::new(run_id, Some(result.task_id), event_type, metadata)
    }

    /// Create a RunFinished event.
    pub fn run_finished(
        run_id: RunId,
        succeeded: usize,
        failed: usize,
        sum: f64,
        elapsed_ms: u128,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("succeeded".to_string(), succeeded.to_string());
        metadata.insert("failed".to_string(), failed.to_string());
        metadata.insert("sum".to_string(), sum.to_string());
        metadata.insert("elapsed_ms".to_string(), elapsed_ms.to_string());
        Self::new(run_id, None, PoolEventType::RunFinished, metadata)
    }
}

/// Type of pool execution event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolEventType {
    /// Workers are about to start on a batch.
    RunStarted,
    /// A worker claimed a task and began executing it.
    TaskStarted,
    /// A task returned a value.
    TaskCompleted,
    /// A task returned an error or panicked.
    TaskFailed,
    /// Every submitted task has reported.
    RunFinished,
}
