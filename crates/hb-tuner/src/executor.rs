//! Task execution: the executor interface, the inline executor, and the
//! submit/gather helpers that the coordinator and the tuner build on.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use hb_types::{ExecutorError, HbResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// How long a worker with nothing to help with sleeps on a result before
/// looking for queued work again.
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of [`TaskExecutor::assist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assist {
    /// Ran one queued task on the calling thread.
    Ran,
    /// The caller is a worker but there was nothing to run.
    Idle,
}

/// Somewhere to run tasks.
///
/// A task waiting on nested tasks of the same executor must not pin its
/// worker. Executors either hand the slot back through
/// [`TaskExecutor::yield_slot`] and [`TaskExecutor::reclaim_slot`], or let
/// the waiting worker run queued work itself through
/// [`TaskExecutor::assist`].
pub trait TaskExecutor: Send + Sync {
    /// Queue `job` for execution. Inline executors run it before returning.
    fn spawn(&self, job: Job) -> HbResult<()>;

    /// Release the calling task's worker slot, if it holds one of this
    /// executor's slots. Returns `true` if a slot was released.
    fn yield_slot(&self) -> bool {
        false
    }

    /// Block until the calling task holds a worker slot again. Only called
    /// after a successful [`TaskExecutor::yield_slot`].
    fn reclaim_slot(&self) {}

    /// Run one queued task on the calling thread if it is one of this
    /// executor's workers. `None` means the caller should simply block.
    fn assist(&self) -> Option<Assist> {
        None
    }

    /// Maximum number of tasks running at once.
    fn concurrency(&self) -> usize;

    /// True if `spawn` runs the job to completion on the caller's thread.
    fn runs_inline(&self) -> bool {
        false
    }

    /// Human-readable executor name.
    fn name(&self) -> &str;
}

/// Runs every job on the calling thread, one at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl TaskExecutor for SequentialExecutor {
    fn spawn(&self, job: Job) -> HbResult<()> {
        job();
        Ok(())
    }

    fn concurrency(&self) -> usize {
        1
    }

    fn runs_inline(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "sequential"
    }
}

/// Pending result of a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: Receiver<HbResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes.
    ///
    /// This is a plain thread-level block. Tasks running on a worker pool
    /// should wait through [`gather`] or [`TaskHandle::wait`].
    pub fn join(self) -> HbResult<T> {
        self.receiver
            .recv()
            .map_err(|_| ExecutorError::ResultDropped)?
    }

    /// Wait for the task, running queued work of `executor` meanwhile if the
    /// caller is one of its workers.
    pub fn wait(self, executor: &dyn TaskExecutor) -> HbResult<T> {
        wait_for(executor, &self.receiver)?
    }
}

/// Receive one message, helping `executor` with queued work while the
/// message is not there yet.
pub(crate) fn wait_for<T>(
    executor: &dyn TaskExecutor,
    receiver: &Receiver<T>,
) -> Result<T, ExecutorError> {
    loop {
        match receiver.try_recv() {
            Ok(message) => return Ok(message),
            Err(TryRecvError::Disconnected) => return Err(ExecutorError::ResultDropped),
            Err(TryRecvError::Empty) => {}
        }
        match executor.assist() {
            Some(Assist::Ran) => {}
            Some(Assist::Idle) => match receiver.recv_timeout(IDLE_WAIT) {
                Ok(message) => return Ok(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(ExecutorError::ResultDropped),
            },
            None => return receiver.recv().map_err(|_| ExecutorError::ResultDropped),
        }
    }
}

/// Submit a task and get a handle to its result. Panics inside the task are
/// returned as [`ExecutorError::TaskPanicked`].
pub fn submit<T, F>(executor: &dyn TaskExecutor, task: F) -> HbResult<TaskHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> HbResult<T> + Send + 'static,
{
    let (sender, receiver) = bounded(1);
    executor.spawn(Box::new(move || {
        // The handle may already be gone if a sibling task failed first.
        let _ = sender.send(guarded(task));
    }))?;
    Ok(TaskHandle { receiver })
}

/// Wait for every handle, in submission order. The calling task gives up its
/// worker slot, or helps run queued work, for the duration of the wait.
///
/// Returns the first failure; the remaining tasks still run to completion
/// but their results are discarded.
pub fn gather<T>(executor: &dyn TaskExecutor, handles: Vec<TaskHandle<T>>) -> HbResult<Vec<T>> {
    let _yielded = SlotYield::new(executor);
    handles.into_iter().map(|handle| handle.wait(executor)).collect()
}

/// Scope guard that releases the current task's worker slot and reclaims one
/// when dropped.
pub struct SlotYield<'a> {
    executor: &'a dyn TaskExecutor,
    yielded: bool,
}

impl<'a> SlotYield<'a> {
    pub fn new(executor: &'a dyn TaskExecutor) -> Self {
        let yielded = executor.yield_slot();
        Self { executor, yielded }
    }

    /// Whether a slot was actually released.
    pub fn yielded(&self) -> bool {
        self.yielded
    }
}

impl Drop for SlotYield<'_> {
    fn drop(&mut self) {
        if self.yielded {
            self.executor.reclaim_slot();
        }
    }
}

/// Run `task`, turning a panic into an error.
pub(crate) fn guarded<T>(task: impl FnOnce() -> HbResult<T>) -> HbResult<T> {
    panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
        Err(ExecutorError::TaskPanicked {
            message: panic_message(payload.as_ref()),
        }
        .into())
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
