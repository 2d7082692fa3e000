//! Fixed-size worker pool draining a [`WorkQueue`]
//!
//! Each worker:
//! - Blocks on the queue for the next message
//! - Runs the pool's [`Job`] on every work item, then acknowledges it
//! - Exits on the stop sentinel
//!
//! A job returning `Err` or panicking is fatal for the phase. The first
//! error is kept, the pool is marked failed, and from then on workers
//! acknowledge items without running them, so `join` still returns.

use crate::error::{CrawlerError, WorkerError};
use crate::walker::queue::{Message, WorkQueue};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// One unit of traversal work, shared by every worker of a pool
pub trait Job: Send + Sync + 'static {
    /// Work item type
    type Item: Send + 'static;

    /// Handle one item. `queue` is the pool's own queue, for jobs that
    /// produce more work.
    fn run(
        &self,
        worker: usize,
        item: Self::Item,
        queue: &WorkQueue<Self::Item>,
    ) -> Result<(), CrawlerError>;
}

/// First fatal error raised by any worker, plus a fast-path flag
#[derive(Default)]
struct Failure {
    failed: AtomicBool,
    error: Mutex<Option<CrawlerError>>,
}

impl Failure {
    fn record(&self, err: CrawlerError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
        self.failed.store(true, Ordering::SeqCst);
    }

    fn is_set(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

/// A set of named worker threads draining one queue
pub struct WorkerPool<J: Job> {
    /// Pool name, used for thread names and errors
    name: &'static str,

    /// Queue the workers drain
    queue: WorkQueue<J::Item>,

    /// Thread handles, indexed by worker id
    handles: Vec<JoinHandle<()>>,

    /// Shared failure slot
    failure: Arc<Failure>,
}

impl<J: Job> WorkerPool<J> {
    /// Spawn `count` workers named `{name}-{id}`
    pub fn spawn(
        name: &'static str,
        count: usize,
        queue: &WorkQueue<J::Item>,
        job: Arc<J>,
    ) -> Result<Self, WorkerError> {
        let failure = Arc::new(Failure::default());
        let mut pool = Self {
            name,
            queue: queue.clone(),
            handles: Vec::with_capacity(count),
            failure,
        };

        for id in 0..count {
            let queue = queue.clone();
            let job = Arc::clone(&job);
            let failure = Arc::clone(&pool.failure);

            let spawned = thread::Builder::new()
                .name(format!("{}-{}", name, id))
                .spawn(move || worker_loop(name, id, queue, job, failure));

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    // Release the workers already running before bailing out
                    let started = pool.handles.len();
                    let _ = pool.queue.stop(started);
                    for handle in pool.handles.drain(..) {
                        let _ = handle.join();
                    }
                    return Err(WorkerError::InitFailed {
                        pool: name,
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(pool = name, count, "Workers spawned");
        Ok(pool)
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// True once any worker has hit a fatal error
    pub fn has_failed(&self) -> bool {
        self.failure.is_set()
    }

    /// Stop every worker with a sentinel and join them.
    ///
    /// Call after the queue has been joined. Returns the first fatal job
    /// error, if any, otherwise the first worker panic.
    pub fn shutdown(mut self) -> Result<(), CrawlerError> {
        self.queue.stop(self.handles.len())?;

        let mut panicked = None;
        for (id, handle) in self.handles.drain(..).enumerate() {
            if handle.join().is_err() {
                warn!(pool = self.name, worker = id, "Worker panicked");
                panicked.get_or_insert(WorkerError::Panicked {
                    pool: self.name,
                    id,
                });
            }
        }

        if let Some(err) = self.failure.error.lock().take() {
            return Err(err);
        }
        match panicked {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

impl<J: Job> Drop for WorkerPool<J> {
    /// A pool dropped without `shutdown` (early return on error) still
    /// stops and joins its workers
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let _ = self.queue.stop(self.handles.len());
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Main worker loop
fn worker_loop<J: Job>(
    pool: &'static str,
    id: usize,
    queue: WorkQueue<J::Item>,
    job: Arc<J>,
    failure: Arc<Failure>,
) {
    debug!(pool, worker = id, "Worker starting");

    while let Some(Message::Work(item)) = queue.recv() {
        if !failure.is_set() {
            // A panicking job must still acknowledge its item or join never returns
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run(id, item, &queue)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(pool, worker = id, error = %e, "Fatal error, abandoning phase");
                    failure.record(e);
                }
                Err(_) => {
                    error!(pool, worker = id, "Job panicked, abandoning phase");
                    failure.record(WorkerError::Panicked { pool, id }.into());
                }
            }
        }
        queue.task_done();
    }

    debug!(pool, worker = id, "Worker shutting down");
}
