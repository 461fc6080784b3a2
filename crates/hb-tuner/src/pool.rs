//! Fixed-size worker pool backed by rayon.
//!
//! The pool has exactly `slots` threads. A task that waits on nested tasks
//! of the same pool does not block its thread: through
//! [`TaskExecutor::assist`] it keeps running queued work (its own nested
//! tasks included) until its results arrive. Idle threads steal whatever
//! the waiting threads have queued, so a batch fans out across every slot.

use rayon::{ThreadPool, ThreadPoolBuilder, Yield};
use tracing::{debug, error};

use hb_types::{invalid_parameter, ExecutorError, HbResult};

use crate::executor::{panic_message, Assist, Job, TaskExecutor};

/// A worker pool with a fixed number of execution slots.
pub struct WorkerPool {
    pool: ThreadPool,
    slots: usize,
}

impl WorkerPool {
    /// Create a pool that runs at most `slots` tasks at a time.
    pub fn new(slots: usize) -> HbResult<Self> {
        if slots == 0 {
            return Err(invalid_parameter!("worker pool needs at least one slot"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(slots)
            .thread_name(|index| format!("hb-worker-{index}"))
            .panic_handler(|payload| {
                error!(panic = %panic_message(payload.as_ref()), "Worker job panicked");
            })
            .build()
            .map_err(|e| ExecutorError::PoolBuild {
                message: e.to_string(),
            })?;

        debug!(slots, "Created worker pool");
        Ok(Self { pool, slots })
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// True if the calling thread is one of this pool's workers.
    pub fn is_worker_thread(&self) -> bool {
        self.pool.current_thread_index().is_some()
    }
}

impl TaskExecutor for WorkerPool {
    fn spawn(&self, job: Job) -> HbResult<()> {
        self.pool.spawn(job);
        Ok(())
    }

    fn assist(&self) -> Option<Assist> {
        match self.pool.yield_now()? {
            Yield::Executed => Some(Assist::Ran),
            Yield::Idle => Some(Assist::Idle),
        }
    }

    fn concurrency(&self) -> usize {
        self.slots
    }

    fn name(&self) -> &str {
        "worker-pool"
    }
}
