//! taskpool - compare a bounded worker pool with sequential execution.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taskpool_worker::{
    hardware_parallelism, run_sequential, run_thread_per_task, workload, JsonObserver,
    PoolObserver, RunReport, TracingObserver, WorkerPool,
};

mod config;

use config::{Config, Mode};

/// taskpool - run a CPU-bound batch on a worker pool and sequentially
#[derive(Parser, Debug)]
#[command(name = "taskpool")]
#[command(about = "Compare pooled and sequential execution of CPU-bound tasks", long_about = None)]
struct Cli {
    /// Worker threads for the pool [default: 2 x CPU cores]
    #[arg(short, long, env = "TASKPOOL_WORKERS")]
    workers: Option<usize>,

    /// Number of tasks in the batch [default: CPU cores]
    #[arg(short, long, env = "TASKPOOL_TASKS")]
    tasks: Option<usize>,

    /// Random draws summed by each task
    #[arg(short, long, env = "TASKPOOL_ITERATIONS")]
    iterations: Option<u64>,

    /// Base seed for the workload
    #[arg(long, env = "TASKPOOL_SEED")]
    seed: Option<u64>,

    /// Make the task with this id fail (repeatable)
    #[arg(long = "fail-task", value_name = "ID")]
    fail_tasks: Vec<u64>,

    /// Execution mode
    #[arg(short, long, value_enum, default_value_t = Mode::Compare)]
    mode: Mode,

    /// Emit run events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Exit with an error if any task fails
    #[arg(long)]
    fail_on_error: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::default();
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(tasks) = self.tasks {
            config.task_count = tasks;
        }
        if let Some(iterations) = self.iterations {
            config.workload.iterations = iterations;
        }
        if let Some(seed) = self.seed {
            config.workload.seed = seed;
        }
        config.workload.fail_tasks.extend(self.fail_tasks);
        config.mode = self.mode;
        config.json = self.json;
        config.fail_on_error = self.fail_on_error;
        config
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config();

    // Logs go to stderr so --json output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskpool=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let observer: Arc<dyn PoolObserver> = if config.json {
        Arc::new(JsonObserver::stdout())
    } else {
        Arc::new(TracingObserver)
    };

    info!(
        cores = hardware_parallelism(),
        workers = config.worker_count,
        tasks = config.task_count,
        iterations = config.workload.iterations,
        mode = ?config.mode,
        "Starting taskpool"
    );

    let reports = run(&config, observer)?;

    let failed: usize = reports.iter().map(RunReport::failed_count).sum();
    if failed > 0 {
        for report in &reports {
            for (task_id, error) in report.failures() {
                warn!(run_id = %report.run_id, task_id = %task_id, error = %error, "Task failed");
            }
        }
        if config.fail_on_error {
            return Err(format!("{} task(s) failed", failed).into());
        }
    }

    Ok(())
}

fn run(
    config: &Config,
    observer: Arc<dyn PoolObserver>,
) -> Result<Vec<RunReport>, Box<dyn std::error::Error>> {
    let batch = || workload::batch(config.task_count, &config.workload);

    let reports = match config.mode {
        Mode::Compare => {
            let pool = WorkerPool::new(config.worker_count, observer.clone())?;
            info!("===== Worker pool =====");
            let pooled = pool.run_all(batch());
            info!("===== Sequential =====");
            let sequential = run_sequential(batch(), observer);
            log_comparison(&pooled, &sequential);
            vec![pooled, sequential]
        }
        Mode::Pool => {
            let pool = WorkerPool::new(config.worker_count, observer)?;
            vec![pool.run_all(batch())]
        }
        Mode::Sequential => vec![run_sequential(batch(), observer)],
        Mode::Threads => vec![run_thread_per_task(batch(), observer)],
    };

    Ok(reports)
}

fn log_comparison(pooled: &RunReport, sequential: &RunReport) {
    let pooled_secs = pooled.elapsed.as_secs_f64();
    let sequential_secs = sequential.elapsed.as_secs_f64();
    let speedup = if pooled_secs > 0.0 {
        sequential_secs / pooled_secs
    } else {
        0.0
    };

    info!(
        pool_secs = format_args!("{:.2}", pooled_secs),
        pool_sum = format_args!("{:.2}", pooled.sum()),
        sequential_secs = format_args!("{:.2}", sequential_secs),
        sequential_sum = format_args!("{:.2}", sequential.sum()),
        speedup = format_args!("{:.2}x", speedup),
        "Comparison"
    );
}
