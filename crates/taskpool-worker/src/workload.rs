//! Synthetic CPU-bound workload used by the comparison driver.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use taskpool_core::{Task, TaskError, TaskId};

/// Default number of random draws per task.
pub const DEFAULT_ITERATIONS: u64 = 10_000_000;

/// Shape of a demonstration batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Random draws summed by each task.
    pub iterations: u64,

    /// Base seed; each task mixes in its own id.
    pub seed: u64,

    /// Tasks that fail instead of computing.
    pub fail_tasks: HashSet<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            seed: 0,
            fail_tasks: HashSet::new(),
        }
    }
}

/// Sum `iterations` uniform draws from `[0, 1)`.
///
/// The generator is seeded from `seed` and `task_id`, so the same task
/// always produces the same value no matter which thread runs it.
pub fn cpu_intensive(task_id: TaskId, iterations: u64, seed: u64) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed ^ task_id.get());
    let mut total = 0.0;
    for _ in 0..iterations {
        total += rng.gen::<f64>();
    }
    total
}

/// Build `count` tasks with ids `0..count`.
pub fn batch(count: usize, config: &WorkloadConfig) -> Vec<Task> {
    (0..count as u64)
        .map(|id| {
            let iterations = config.iterations;
            let seed = config.seed;
            let fails = config.fail_tasks.contains(&id);
            Task::new(id, move || {
                if fails {
                    return Err(TaskError::Failed(format!("injected failure for task {}", id)));
                }
                Ok(cpu_intensive(TaskId::new(id), iterations, seed))
            })
        })
        .collect()
}
