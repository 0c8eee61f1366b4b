//! taskpool Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Threads or worker scheduling
//! - Logging backends
//!
//! All types here describe a batch of work and what became of it.

pub mod error;
pub mod event;
pub mod ids;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use error::TaskError;
pub use event::{PoolEvent, PoolEventType};
pub use ids::{EventId, RunId, TaskId, WorkerId};
pub use status::ResultStatus;
pub use task::{Task, TaskResult};
