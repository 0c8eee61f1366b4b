//! taskpool Worker Pool
//!
//! Runs a batch of [`Task`](taskpool_core::Task)s on a fixed number of worker
//! threads and collects one [`TaskResult`](taskpool_core::TaskResult) per
//! task, in completion order.

pub mod config;
pub mod error;
pub mod json_output;
pub mod observer;
pub mod pool;
pub mod report;
pub mod workload;

pub use config::{default_worker_count, hardware_parallelism, PoolConfig};
pub use error::PoolError;
pub use json_output::JsonObserver;
pub use observer::{NoopObserver, PoolObserver, RecordingObserver, TracingObserver};
pub use pool::{run_all, run_sequential, run_thread_per_task, WorkerPool};
pub use report::{RunReport, RunSummary};
pub use workload::WorkloadConfig;
