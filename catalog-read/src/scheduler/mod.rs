//! Work scheduling.
//!
//! The orchestration layer hands every task execution to a [`TaskScheduler`]
//! as an opaque callable and makes no assumption about which thread runs it.
//! The scheduler's own concurrency bound is the only admission control: bulk
//! operations such as prefetch submit all of their sub-fetches at once and
//! rely on the pool to queue them.
//!
//! When no scheduler is configured, [`execute_or_schedule`] runs the task
//! inline on the calling thread.

use std::fmt;

use thiserror::Error;
use tracing::{debug, error};

/// A unit of work accepted by a scheduler.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Default worker count for [`ThreadPoolScheduler`].
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Errors raised while building a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The worker count must be at least one.
    #[error("Invalid worker thread count: {0}")]
    InvalidThreadCount(usize),

    /// The thread pool could not be created.
    #[error("Failed to build thread pool: {0}")]
    PoolBuild(String),
}

/// Accepts callables and runs them on some thread, eventually.
pub trait TaskScheduler: Send + Sync {
    /// Submits `job` for execution.
    fn schedule(&self, job: Job);
}

/// Runs `job` on `scheduler`, or inline if there is none.
pub fn execute_or_schedule<F>(scheduler: Option<&dyn TaskScheduler>, job: F)
where
    F: FnOnce() + Send + 'static,
{
    match scheduler {
        Some(scheduler) => scheduler.schedule(Box::new(job)),
        None => job(),
    }
}

/// Fixed-size worker pool backed by rayon.
pub struct ThreadPoolScheduler {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl ThreadPoolScheduler {
    /// Creates a pool with `threads` workers.
    pub fn new(threads: usize) -> Result<Self, SchedulerError> {
        if threads == 0 {
            return Err(SchedulerError::InvalidThreadCount(threads));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("catalog-read-worker-{}", index))
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %message, "Scheduled job panicked");
            })
            .build()
            .map_err(|e| SchedulerError::PoolBuild(e.to_string()))?;

        debug!(threads, "Thread pool scheduler started");
        Ok(Self { pool, threads })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl TaskScheduler for ThreadPoolScheduler {
    fn schedule(&self, job: Job) {
        self.pool.spawn(job);
    }
}

impl fmt::Debug for ThreadPoolScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolScheduler")
            .field("threads", &self.threads)
            .finish()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    /// Queues jobs until the test runs them.
    #[derive(Default)]
    pub struct ManualScheduler {
        queue: Mutex<VecDeque<Job>>,
    }

    impl ManualScheduler {
        /// Runs the oldest queued job. Returns false if the queue was empty.
        pub fn run_next(&self) -> bool {
            let job = self.queue.lock().pop_front();
            match job {
                Some(job) => {
                    job();
                    true
                }
                None => false,
            }
        }

        /// Runs jobs until the queue is empty, including jobs queued meanwhile.
        pub fn run_all(&self) {
            while self.run_next() {}
        }

        pub fn len(&self) -> usize {
            self.queue.lock().len()
        }
    }

    impl TaskScheduler for ManualScheduler {
        fn schedule(&self, job: Job) {
            self.queue.lock().push_back(job);
        }
    }

    #[test]
    fn test_manual_scheduler_defers_jobs() {
        let scheduler = ManualScheduler::default();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            execute_or_schedule(Some(&scheduler), move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.len(), 3);

        assert!(scheduler.run_next());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        scheduler.run_all();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!scheduler.run_next());
    }

    #[test]
    fn test_execute_inline_without_scheduler() {
        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();

        execute_or_schedule(None, move || tx.send(std::thread::current().id()).unwrap());

        assert_eq!(rx.try_recv().unwrap(), caller);
    }

    #[test]
    fn test_thread_pool_runs_jobs() {
        let scheduler = ThreadPoolScheduler::new(2).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        for _ in 0..10 {
            let count = Arc::clone(&count);
            let tx = tx.clone();
            execute_or_schedule(Some(&scheduler), move || {
                count.fetch_add(1, Ordering::SeqCst);
                tx.send(()).unwrap();
            });
        }
        for _ in 0..10 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_thread_pool_uses_worker_threads() {
        let scheduler = ThreadPoolScheduler::new(1).unwrap();
        let (tx, rx) = mpsc::channel();

        scheduler.schedule(Box::new(move || {
            tx.send(std::thread::current().name().map(str::to_string)).unwrap();
        }));

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("catalog-read-worker-0"));
        assert_eq!(scheduler.threads(), 1);
    }

    #[test]
    fn test_panicking_job_does_not_stop_the_pool() {
        let scheduler = ThreadPoolScheduler::new(1).unwrap();
        let (tx, rx) = mpsc::channel();

        scheduler.schedule(Box::new(|| panic!("job failed")));
        scheduler.schedule(Box::new(move || tx.send(()).unwrap()));

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = ThreadPoolScheduler::new(0);
        assert!(matches!(result, Err(SchedulerError::InvalidThreadCount(0))));
    }
}
