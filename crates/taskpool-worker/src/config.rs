//! Pool configuration.

use crate::PoolError;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads started per run.
    pub worker_count: usize,

    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name_prefix: String,
}

impl PoolConfig {
    /// Create a config with the given worker count and default thread names.
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Builder method to set the thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Reject configurations no pool can run with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.worker_count == 0 {
            return Err(PoolError::InvalidWorkerCount {
                requested: self.worker_count,
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(hardware_parallelism()),
            thread_name_prefix: "taskpool-worker".to_string(),
        }
    }
}

/// Number of logical CPUs on this host.
pub fn hardware_parallelism() -> usize {
    num_cpus::get().max(1)
}

/// Default worker count for a host with the given parallelism: two workers
/// per core, and never fewer than two.
pub fn default_worker_count(hardware_parallelism: usize) -> usize {
    hardware_parallelism.max(1) * 2
}
