//! Driver configuration.

use std::collections::HashSet;

use taskpool_worker::workload::DEFAULT_ITERATIONS;
use taskpool_worker::{default_worker_count, hardware_parallelism, WorkloadConfig};

/// How the batch is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Pool run followed by a sequential run of the same batch.
    #[default]
    Compare,
    /// Pool run only.
    Pool,
    /// Sequential run only.
    Sequential,
    /// One thread per task, no bound.
    Threads,
}

/// Resolved driver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Worker threads for pooled runs.
    pub worker_count: usize,

    /// Tasks per batch.
    pub task_count: usize,

    /// Workload shape.
    pub workload: WorkloadConfig,

    /// Which execution strategies to run.
    pub mode: Mode,

    /// Emit JSON lines on stdout instead of log lines.
    pub json: bool,

    /// Exit non-zero when any task fails.
    pub fail_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        let cores = hardware_parallelism();
        Self {
            worker_count: default_worker_count(cores),
            task_count: cores,
            workload: WorkloadConfig {
                iterations: DEFAULT_ITERATIONS,
                seed: 0,
                fail_tasks: HashSet::new(),
            },
            mode: Mode::default(),
            json: false,
            fail_on_error: false,
        }
    }
}
