//! Bounded worker pool.
//!
//! A run puts the whole batch into one FIFO queue and starts a fixed number
//! of worker threads. Each worker claims the next task under the queue lock,
//! executes it with the lock released, and sends its [`TaskResult`] back over
//! a channel. The calling thread collects results as they arrive, so a slow
//! task only occupies its own worker.
//!
//! Observer callbacks are isolated as well: a panicking observer is logged
//! and ignored, and never costs the run a result.

use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{unbounded, Sender};
use taskpool_core::{RunId, Task, TaskError, TaskResult, WorkerId};
use tracing::{debug, warn};

use crate::{PoolConfig, PoolError, PoolObserver, RunReport};

type TaskQueue = Mutex<VecDeque<Task>>;

/// Executes batches of tasks with at most `worker_count` running at once.
///
/// The pool holds no threads between runs; every call to
/// [`run_all`](WorkerPool::run_all) starts its workers and joins them before
/// returning, so one pool can be reused for any number of batches.
pub struct WorkerPool {
    config: PoolConfig,
    observer: Arc<dyn PoolObserver>,
    /// Worker indices below this fail to spawn.
    #[cfg(test)]
    refused_spawns: usize,
}

impl WorkerPool {
    /// Create a pool with `worker_count` workers.
    ///
    /// Fails with [`PoolError::InvalidWorkerCount`] when `worker_count` is 0.
    pub fn new(worker_count: usize, observer: Arc<dyn PoolObserver>) -> Result<Self, PoolError> {
        Self::with_config(PoolConfig::new(worker_count), observer)
    }

    /// Create a pool from a full configuration.
    pub fn with_config(
        config: PoolConfig,
        observer: Arc<dyn PoolObserver>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self {
            config,
            observer,
            #[cfg(test)]
            refused_spawns: 0,
        })
    }

    /// Number of workers each run may use.
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Execute every task and block until each one has reported.
    ///
    /// Results are in completion order. A failing or panicking task is
    /// recorded in its own result and does not stop the run.
    pub fn run_all(&self, tasks: Vec<Task>) -> RunReport {
        let run = Run::begin(self.config.worker_count, tasks.len(), &*self.observer);
        if tasks.is_empty() {
            return run.finish(Vec::new(), &*self.observer);
        }

        let queue: TaskQueue = Mutex::new(VecDeque::from(tasks));
        let workers = self.config.worker_count.min(run.submitted);
        let mut results = Vec::with_capacity(run.submitted);

        let spawned = thread::scope(|scope| {
            let (result_tx, result_rx) = unbounded();
            let mut spawned = 0;

            for index in 0..workers {
                let worker = Worker {
                    id: WorkerId::new(index),
                    run_id: &run.run_id,
                    queue: &queue,
                    observer: &*self.observer,
                };
                let result_tx = result_tx.clone();
                match self.spawn_worker(scope, index, move || worker.run(&result_tx)) {
                    Ok(_) => spawned += 1,
                    Err(e) => warn!(worker = index, error = %e, "Failed to spawn worker thread"),
                }
            }

            // Only worker clones remain, so the iterator ends when the last
            // worker drains the queue and exits.
            drop(result_tx);
            results.extend(result_rx.iter());
            spawned
        });

        // Every worker has exited. Anything still queued belongs to workers
        // that never started; run it here, one task at a time.
        if !queue.lock().unwrap_or_else(PoisonError::into_inner).is_empty() {
            warn!(
                run_id = %run.run_id,
                spawned,
                requested = workers,
                "Draining leftover tasks on the calling thread"
            );
            let worker = Worker {
                id: WorkerId::new(workers),
                run_id: &run.run_id,
                queue: &queue,
                observer: &*self.observer,
            };
            results.extend(worker.drain());
        }

        run.finish(results, &*self.observer)
    }

    fn spawn_worker<'scope, F>(
        &self,
        scope: &'scope thread::Scope<'scope, '_>,
        index: usize,
        body: F,
    ) -> io::Result<()>
    where
        F: FnOnce() + Send + 'scope,
    {
        #[cfg(test)]
        if index < self.refused_spawns {
            return Err(io::Error::other("spawn refused"));
        }

        thread::Builder::new()
            .name(format!("{}-{}", self.config.thread_name_prefix, index))
            .spawn_scoped(scope, body)
            .map(|_| ())
    }
}

/// Validate `worker_count`, then run the batch on a fresh pool.
///
/// No task executes if the worker count is rejected.
pub fn run_all(
    tasks: Vec<Task>,
    worker_count: usize,
    observer: Arc<dyn PoolObserver>,
) -> Result<RunReport, PoolError> {
    let pool = WorkerPool::new(worker_count, observer)?;
    Ok(pool.run_all(tasks))
}

/// Run the batch one task at a time on the calling thread.
pub fn run_sequential(tasks: Vec<Task>, observer: Arc<dyn PoolObserver>) -> RunReport {
    let run = Run::begin(1, tasks.len(), &*observer);
    let queue: TaskQueue = Mutex::new(VecDeque::from(tasks));
    let worker = Worker {
        id: WorkerId::new(0),
        run_id: &run.run_id,
        queue: &queue,
        observer: &*observer,
    };
    let results = worker.drain();
    run.finish(results, &*observer)
}

/// Run every task on its own thread, with no concurrency bound.
pub fn run_thread_per_task(tasks: Vec<Task>, observer: Arc<dyn PoolObserver>) -> RunReport {
    let pool = WorkerPool {
        config: PoolConfig::new(tasks.len().max(1)).with_thread_name_prefix("taskpool-task"),
        observer,
        #[cfg(test)]
        refused_spawns: 0,
    };
    pool.run_all(tasks)
}

/// Bookkeeping shared by every execution strategy.
struct Run {
    run_id: RunId,
    worker_count: usize,
    submitted: usize,
    started: Instant,
}

impl Run {
    fn begin(worker_count: usize, submitted: usize, observer: &dyn PoolObserver) -> Self {
        let run_id = RunId::generate();
        notify("on_run_start", || {
            observer.on_run_start(&run_id, worker_count, submitted)
        });
        Self {
            run_id,
            worker_count,
            submitted,
            started: Instant::now(),
        }
    }

    fn finish(self, results: Vec<TaskResult>, observer: &dyn PoolObserver) -> RunReport {
        let report = RunReport {
            run_id: self.run_id,
            worker_count: self.worker_count,
            submitted: self.submitted,
            results,
            elapsed: self.started.elapsed(),
        };
        debug_assert!(report.is_complete(), "every task reports exactly once");
        let summary = report.summary();
        notify("on_run_summary", || observer.on_run_summary(&summary));
        report
    }
}

struct Worker<'a> {
    id: WorkerId,
    run_id: &'a RunId,
    queue: &'a TaskQueue,
    observer: &'a dyn PoolObserver,
}

impl Worker<'_> {
    /// Claim and execute tasks until the queue is empty.
    fn run(&self, results: &Sender<TaskResult>) {
        let mut executed = 0usize;
        while let Some(task) = self.claim() {
            let result = self.execute(task);
            executed += 1;
            if results.send(result).is_err() {
                warn!(worker = %self.id, "Result collector dropped");
            }
        }
        debug!(run_id = %self.run_id, worker = %self.id, executed, "Worker finished");
    }

    /// Execute the rest of the queue on the current thread.
    fn drain(&self) -> Vec<TaskResult> {
        let (result_tx, result_rx) = unbounded();
        self.run(&result_tx);
        drop(result_tx);
        result_rx.try_iter().collect()
    }

    fn claim(&self) -> Option<Task> {
        // Tasks never run under the lock, so a poisoned queue is still consistent.
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn execute(&self, task: Task) -> TaskResult {
        let task_id = task.id();
        notify("on_task_start", || {
            self.observer.on_task_start(self.run_id, task_id, self.id)
        });

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.execute()))
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

        let result = TaskResult::new(task_id, self.id, started.elapsed(), outcome);
        notify("on_task_end", || self.observer.on_task_end(self.run_id, &result));
        result
    }
}

/// Invoke an observer callback, logging instead of unwinding if it panics.
fn notify(callback: &str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        warn!(
            callback,
            panic = %panic_message(payload.as_ref()),
            "Observer panicked; event dropped"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoopObserver, RecordingObserver};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use taskpool_core::{PoolEventType, TaskId};

    fn noop() -> Arc<dyn PoolObserver> {
        Arc::new(NoopObserver)
    }

    fn id_tasks(count: u64) -> Vec<Task> {
        (0..count).map(|i| Task::infallible(i, move || i as f64)).collect()
    }

    fn sorted_ids(report: &RunReport) -> Vec<u64> {
        let mut ids: Vec<u64> = report.results.iter().map(|r| r.task_id.get()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_every_task_reports_once() {
        let pool = WorkerPool::new(3, noop()).unwrap();

        for count in [1u64, 2, 3, 7, 64] {
            let report = pool.run_all(id_tasks(count));
            assert_eq!(report.results.len(), count as usize);
            assert_eq!(sorted_ids(&report), (0..count).collect::<Vec<_>>());
            assert!(report.is_complete());
        }
    }

    #[test]
    fn test_empty_batch() {
        let observer = Arc::new(RecordingObserver::new());
        let report = run_all(Vec::new(), 4, observer.clone()).unwrap();

        assert!(report.results.is_empty());
        assert!(report.is_complete());
        assert_eq!(report.sum(), 0.0);
        assert_eq!(observer.count(PoolEventType::TaskStarted), 0);
        assert_eq!(observer.count(PoolEventType::RunFinished), 1);
    }

    #[test]
    fn test_zero_workers_runs_nothing() {
        let executed = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<Task> = (0..5u64)
            .map(|i| {
                let executed = executed.clone();
                Task::infallible(i, move || {
                    executed.fetch_add(1, Ordering::SeqCst);
                    1.0
                })
            })
            .collect();

        let observer = Arc::new(RecordingObserver::new());
        let err = run_all(tasks, 0, observer.clone()).unwrap_err();

        assert_eq!(err, PoolError::InvalidWorkerCount { requested: 0 });
        assert_eq!(executed.load(Ordering::SeqCst), 0);
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_failed_task_does_not_stop_the_batch() {
        let tasks: Vec<Task> = (1..=5u64)
            .map(|i| {
                Task::new(i, move || {
                    if i == 3 {
                        Err(TaskError::failed("task 3 always fails"))
                    } else {
                        Ok(i as f64)
                    }
                })
            })
            .collect();

        let report = run_all(tasks, 2, noop()).unwrap();

        assert_eq!(report.results.len(), 5);
        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.failed_count(), 1);

        let failed = report.result_for(TaskId::new(3)).unwrap();
        assert_eq!(failed.value(), None);
        assert_eq!(
            failed.error(),
            Some(&TaskError::Failed("task 3 always fails".to_string()))
        );
        assert_eq!(report.sum(), 1.0 + 2.0 + 4.0 + 5.0);
    }

    #[test]
    fn test_panicking_task_is_recorded() {
        let tasks = vec![
            Task::infallible(0u64, || 1.0),
            Task::infallible(1u64, || panic!("kaboom")),
            Task::infallible(2u64, || 2.0),
        ];

        let report = run_all(tasks, 1, noop()).unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(
            report.result_for(TaskId::new(1)).unwrap().error(),
            Some(&TaskError::Panicked("kaboom".to_string()))
        );
        // The single worker survived the panic and ran the last task.
        let last = report.result_for(TaskId::new(2)).unwrap();
        assert_eq!(last.value(), Some(2.0));
        assert_eq!(last.worker, WorkerId::new(0));
    }

    #[test]
    fn test_concurrency_never_exceeds_worker_count() {
        for workers in [1usize, 3] {
            let active = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));

            let tasks: Vec<Task> = (0..12u64)
                .map(|i| {
                    let active = active.clone();
                    let peak = peak.clone();
                    Task::infallible(i, move || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(15));
                        active.fetch_sub(1, Ordering::SeqCst);
                        i as f64
                    })
                })
                .collect();

            let report = run_all(tasks, workers, noop()).unwrap();

            assert_eq!(report.results.len(), 12);
            let observed = peak.load(Ordering::SeqCst);
            assert!(observed >= 1 && observed <= workers, "peak {} > {}", observed, workers);
        }
    }

    #[test]
    fn test_sum_is_independent_of_worker_count() {
        let sums: Vec<f64> = [1usize, 4, 8]
            .into_iter()
            .map(|workers| {
                let tasks: Vec<Task> = (0..20u64)
                    .map(|i| Task::infallible(i, move || i as f64 * 2.0))
                    .collect();
                run_all(tasks, workers, noop()).unwrap().sum()
            })
            .collect();

        assert_eq!(sums, vec![380.0, 380.0, 380.0]);
    }

    #[test]
    fn test_eight_tasks_four_workers() {
        let report = run_all(id_tasks(8), 4, noop()).unwrap();

        let mut values: Vec<f64> = report.values().collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(report.sum(), 28.0);
        assert!(!report.has_failures());
        assert_eq!(report.worker_count, 4);
    }

    #[test]
    fn test_slow_task_does_not_block_collection() {
        let tasks = vec![
            Task::infallible(0u64, || {
                thread::sleep(Duration::from_millis(200));
                0.0
            }),
            Task::infallible(1u64, || 1.0),
        ];

        let report = run_all(tasks, 2, noop()).unwrap();

        assert_eq!(report.results[0].task_id, TaskId::new(1));
        assert_eq!(report.results[1].task_id, TaskId::new(0));
    }

    #[test]
    fn test_pool_is_reusable() {
        let pool = WorkerPool::new(2, noop()).unwrap();

        let first = pool.run_all(id_tasks(4));
        let second = pool.run_all(id_tasks(6));

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.results.len(), 4);
        assert_eq!(second.results.len(), 6);
        assert_eq!(second.sum(), 15.0);
    }

    #[test]
    fn test_observer_sees_every_task() {
        let observer = Arc::new(RecordingObserver::new());
        let tasks: Vec<Task> = (0..6u64)
            .map(|i| {
                Task::new(i, move || {
                    if i % 2 == 0 {
                        Ok(i as f64)
                    } else {
                        Err(TaskError::failed("odd"))
                    }
                })
            })
            .collect();

        let report = run_all(tasks, 3, observer.clone()).unwrap();

        assert_eq!(observer.count(PoolEventType::RunStarted), 1);
        assert_eq!(observer.count(PoolEventType::TaskStarted), 6);
        assert_eq!(observer.count(PoolEventType::TaskCompleted), 3);
        assert_eq!(observer.count(PoolEventType::TaskFailed), 3);
        assert_eq!(observer.count(PoolEventType::RunFinished), 1);

        let events = observer.events();
        assert_eq!(events.first().unwrap().event_type, PoolEventType::RunStarted);
        assert_eq!(events.last().unwrap().event_type, PoolEventType::RunFinished);
        assert!(events.iter().all(|e| e.run_id == report.run_id));
    }

    #[test]
    fn test_sequential_preserves_submission_order() {
        let report = run_sequential(id_tasks(5), noop());

        let ids: Vec<u64> = report.results.iter().map(|r| r.task_id.get()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(report.worker_count, 1);
        assert!(report.results.iter().all(|r| r.worker == WorkerId::new(0)));
        assert_eq!(report.sum(), 10.0);
    }

    #[test]
    fn test_thread_per_task() {
        let report = run_thread_per_task(id_tasks(5), noop());

        assert_eq!(report.worker_count, 5);
        assert_eq!(sorted_ids(&report), vec![0, 1, 2, 3, 4]);
        assert_eq!(report.sum(), 10.0);

        let empty = run_thread_per_task(Vec::new(), noop());
        assert!(empty.results.is_empty());
    }

    #[test]
    fn test_workers_use_configured_thread_names() {
        let config = PoolConfig::new(2).with_thread_name_prefix("calc");
        let pool = WorkerPool::with_config(config, noop()).unwrap();

        let tasks: Vec<Task> = (0..4u64)
            .map(|i| {
                Task::new(i, move || {
                    let name = thread::current().name().unwrap_or_default().to_string();
                    if name.starts_with("calc-") {
                        Ok(1.0)
                    } else {
                        Err(TaskError::failed(name))
                    }
                })
            })
            .collect();

        let report = pool.run_all(tasks);
        assert_eq!(report.succeeded(), 4);
    }

    struct PanickingObserver;

    impl PoolObserver for PanickingObserver {
        fn on_task_end(&self, _run_id: &RunId, result: &TaskResult) {
            if result.task_id == TaskId::new(1) {
                panic!("observer failed on task 1");
            }
        }

        fn on_run_summary(&self, _summary: &crate::RunSummary) {
            panic!("observer failed on summary");
        }
    }

    #[test]
    fn test_panicking_observer_does_not_lose_results() {
        let report = run_all(id_tasks(4), 2, Arc::new(PanickingObserver)).unwrap();

        assert_eq!(report.results.len(), 4);
        assert!(report.is_complete());
        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.sum(), 6.0);
    }

    fn counted_tasks(count: u64, active: &Arc<AtomicUsize>, peak: &Arc<AtomicUsize>) -> Vec<Task> {
        (0..count)
            .map(|i| {
                let active = active.clone();
                let peak = peak.clone();
                Task::infallible(i, move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                    i as f64
                })
            })
            .collect()
    }

    #[test]
    fn test_no_worker_spawned_drains_on_caller() {
        let mut pool = WorkerPool::new(3, noop()).unwrap();
        pool.refused_spawns = 3;

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let report = pool.run_all(counted_tasks(6, &active, &peak));

        assert!(report.is_complete());
        assert_eq!(sorted_ids(&report), vec![0, 1, 2, 3, 4, 5]);
        assert!(report.results.iter().all(|r| r.worker == WorkerId::new(3)));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_partial_spawn_failure_keeps_bound() {
        let mut pool = WorkerPool::new(3, noop()).unwrap();
        pool.refused_spawns = 2;

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let report = pool.run_all(counted_tasks(9, &active, &peak));

        assert!(report.is_complete());
        assert_eq!(sorted_ids(&report), (0..9).collect::<Vec<_>>());
        assert!(report.results.iter().all(|r| r.worker == WorkerId::new(2)));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
