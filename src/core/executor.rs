//! Bounded-concurrency executor that starts a fresh OS thread per task.
//!
//! # Admission
//!
//! The executor keeps a counter of available slots and a FIFO queue of work
//! that has not been admitted yet, both behind one mutex:
//!
//! - `submit` takes a slot and spawns a thread if one is free, otherwise it
//!   appends the work to the queue. It never waits for outstanding work.
//! - When a task finishes, its slot goes straight to the head of the queue,
//!   which gets its own new thread. Only when the queue is empty does the
//!   slot counter grow again.
//!
//! Threads are never reused. The slot counter is an admission gate, not a
//! pool of workers.
//!
//! # Failure behavior
//!
//! Work items run under `catch_unwind`: a panic resolves the handle with
//! [`TaskError::Panicked`] and the slot is released as usual. A work item that
//! never returns keeps its slot forever; the executor cannot detect this, so
//! each such item permanently lowers the effective concurrency by one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ExecutorConfig;

use super::error::{ExecutorError, TaskError};
use super::handle::{CompletionHook, ResultHandle};
use super::task::{QueuedTask, TaskId};

/// Snapshot of executor utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Configured slot budget.
    pub slots: usize,
    /// Slots free for immediate admission.
    pub available_slots: usize,
    /// Tasks waiting for a slot.
    pub queued_tasks: usize,
    /// Tasks whose thread has been started and whose outcome is not yet produced.
    pub running_tasks: u64,
    /// Tasks accepted before shutdown.
    pub submitted_tasks: u64,
    /// Tasks whose work item returned normally.
    pub completed_tasks: u64,
    /// Tasks that panicked or could not get a thread.
    pub failed_tasks: u64,
    /// Submissions rejected after shutdown.
    pub cancelled_tasks: u64,
}

/// Lock-free counters; informational only, never used for admission.
#[derive(Debug, Default)]
struct ExecutorCounters {
    running: AtomicU64,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// Slot counter and pending queue, always read and written together.
struct AdmissionState {
    available_slots: usize,
    pending: VecDeque<QueuedTask>,
}

/// State shared by the executor and every task thread it started.
struct Shared {
    id: Uuid,
    config: ExecutorConfig,
    state: Mutex<AdmissionState>,
    shutdown: AtomicBool,
    next_task_id: AtomicU64,
    counters: ExecutorCounters,
}

impl Shared {
    /// Start `task` on a new thread. Its slot has already been taken.
    ///
    /// If the thread cannot be spawned, the task's handle is resolved with
    /// [`TaskError::SpawnFailed`] and the slot passes on as if the task had
    /// finished, looping rather than recursing.
    fn launch(&self, task: QueuedTask) {
        let mut next = Some(task);
        while let Some(task) = next.take() {
            let (task_id, run, abandon) = task.into_parts();

            let mut builder = thread::Builder::new()
                .name(format!("{}-{task_id}", self.config.thread_name_prefix));
            if let Some(stack_size) = self.config.thread_stack_size {
                builder = builder.stack_size(stack_size);
            }

            self.counters.running.fetch_add(1, Ordering::Relaxed);
            match builder.spawn(run) {
                Ok(_detached) => {
                    debug!(executor = %self.config.name, task_id, "task thread started");
                }
                Err(e) => {
                    self.counters.running.fetch_sub(1, Ordering::Relaxed);
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        executor = %self.config.name,
                        task_id,
                        error = %e,
                        "failed to spawn task thread"
                    );
                    abandon(TaskError::SpawnFailed(e.to_string()));
                    next = self.release_slot(task_id);
                }
            }
        }
    }

    /// Hand the finished task's slot to the oldest queued task, or return it
    /// to the counter when nothing is waiting.
    fn release_slot(&self, finished: TaskId) -> Option<QueuedTask> {
        let mut state = self.state.lock();
        if let Some(task) = state.pending.pop_front() {
            debug!(
                executor = %self.config.name,
                finished,
                admitted = task.id,
                queued = state.pending.len(),
                "slot handed to queued task"
            );
            Some(task)
        } else {
            state.available_slots += 1;
            debug!(
                executor = %self.config.name,
                finished,
                available_slots = state.available_slots,
                "slot released"
            );
            None
        }
    }
}

impl CompletionHook for Shared {
    fn task_completed(&self, task_id: TaskId, succeeded: bool) {
        self.counters.running.fetch_sub(1, Ordering::Relaxed);
        if succeeded {
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(executor = %self.config.name, task_id, "task panicked");
        }

        if let Some(next) = self.release_slot(task_id) {
            self.launch(next);
        }
    }
}

/// Executor limiting how many submitted work items run at once.
///
/// Each admitted work item runs on its own newly spawned OS thread. Work
/// beyond the slot budget waits in an unbounded FIFO queue.
///
/// Dropping the executor shuts it down. Work that was already admitted or
/// queued still runs to completion.
///
/// # Example
///
/// ```
/// use prometheus_slot_executor::Executor;
///
/// let executor = Executor::new(2)?;
/// let handles: Vec<_> = (0..5)
///     .map(|i| executor.submit(move || i * 10))
///     .collect();
///
/// for (i, handle) in handles.iter().enumerate() {
///     assert_eq!(handle.result(), Ok(&(i * 10)));
/// }
/// # Ok::<(), prometheus_slot_executor::ExecutorError>(())
/// ```
pub struct Executor {
    shared: Arc<Shared>,
}

impl Executor {
    /// Create an executor with `slots` admission slots and default settings.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::InvalidConfig` if `slots` is zero.
    pub fn new(slots: usize) -> Result<Self, ExecutorError> {
        Self::with_config(ExecutorConfig::new().with_slots(slots))
    }

    /// Create an executor from a configuration.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate().map_err(ExecutorError::InvalidConfig)?;

        let id = Uuid::new_v4();
        info!(
            executor = %config.name,
            executor_id = %id,
            slots = config.slots,
            "executor initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                state: Mutex::new(AdmissionState {
                    available_slots: config.slots,
                    pending: VecDeque::new(),
                }),
                config,
                shutdown: AtomicBool::new(false),
                next_task_id: AtomicU64::new(0),
                counters: ExecutorCounters::default(),
            }),
        })
    }

    /// Run `f` with a fresh executor and shut it down when `f` returns or
    /// unwinds.
    ///
    /// Work submitted inside the scope keeps running after it ends; only new
    /// submissions are refused.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::InvalidConfig` if the configuration is invalid.
    pub fn scope<T, F>(config: ExecutorConfig, f: F) -> Result<T, ExecutorError>
    where
        F: FnOnce(&Self) -> T,
    {
        let executor = Self::with_config(config)?;
        let _guard = executor.shutdown_guard();
        Ok(f(&executor))
    }

    /// Guard that calls [`shutdown`](Self::shutdown) when dropped, including
    /// during unwinding.
    #[must_use = "the executor shuts down as soon as the guard is dropped"]
    pub const fn shutdown_guard(&self) -> ShutdownGuard<'_> {
        ShutdownGuard { executor: self }
    }

    /// Submit a work item and return a handle to its eventual outcome.
    ///
    /// Never blocks on outstanding work. After shutdown the returned handle
    /// is already cancelled and `job` is dropped without running.
    ///
    /// The return type must be `Sync` as well as `Send`, because observers on
    /// any thread read it through [`ResultHandle::result`] as `&R`. Values
    /// that are only `Send` (an `mpsc::Receiver`, a `Cell`) must be wrapped,
    /// for example in a `Mutex`, before being returned.
    pub fn submit<F, R>(&self, job: F) -> ResultHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        let shared = &self.shared;
        let task_id = shared.next_task_id.fetch_add(1, Ordering::Relaxed);

        // Snapshot only: a submit racing with shutdown may still be accepted.
        if shared.shutdown.load(Ordering::Acquire) {
            shared.counters.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(executor = %shared.config.name, task_id, "submit after shutdown, task cancelled");
            return ResultHandle::cancelled(task_id);
        }
        shared.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let hook: Arc<dyn CompletionHook> = Arc::clone(shared) as Arc<dyn CompletionHook>;
        let handle = ResultHandle::pending(task_id, hook);
        let task = QueuedTask::new(task_id, job, handle.clone());

        let admitted = {
            let mut state = shared.state.lock();
            if state.available_slots > 0 {
                state.available_slots -= 1;
                debug!(
                    executor = %shared.config.name,
                    task_id,
                    available_slots = state.available_slots,
                    "task admitted"
                );
                Some(task)
            } else {
                state.pending.push_back(task);
                debug!(
                    executor = %shared.config.name,
                    task_id,
                    queued = state.pending.len(),
                    "no free slot, task queued"
                );
                None
            }
        };

        if let Some(task) = admitted {
            shared.launch(task);
        }
        handle
    }

    /// Submit a callable together with its arguments.
    ///
    /// Equivalent to `submit(move || job(args))`.
    pub fn submit_with<A, F, R>(&self, args: A, job: F) -> ResultHandle<R>
    where
        A: Send + 'static,
        F: FnOnce(A) -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        self.submit(move || job(args))
    }

    /// Refuse all future submissions.
    ///
    /// Admitted and queued work is neither cancelled nor awaited. Calling this
    /// more than once has no further effect.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let queued = self.shared.state.lock().pending.len();
        info!(
            executor = %self.shared.config.name,
            executor_id = %self.shared.id,
            queued,
            "executor shut down, queued tasks will still run"
        );
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Current utilization.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        let (available_slots, queued_tasks) = {
            let state = self.shared.state.lock();
            (state.available_slots, state.pending.len())
        };
        let counters = &self.shared.counters;
        ExecutorStats {
            slots: self.shared.config.slots,
            available_slots,
            queued_tasks,
            running_tasks: counters.running.load(Ordering::Relaxed),
            submitted_tasks: counters.submitted.load(Ordering::Relaxed),
            completed_tasks: counters.completed.load(Ordering::Relaxed),
            failed_tasks: counters.failed.load(Ordering::Relaxed),
            cancelled_tasks: counters.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Configuration this executor was built with.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    /// Unique identifier of this executor instance.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if !self.is_shutdown() {
            debug!(executor = %self.shared.config.name, "executor dropped without explicit shutdown");
        }
        self.shutdown();
    }
}

/// Shuts the executor down when dropped. See [`Executor::shutdown_guard`].
#[derive(Debug)]
pub struct ShutdownGuard<'a> {
    executor: &'a Executor,
}

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        self.executor.shutdown();
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.shared.config.name)
            .field("id", &self.shared.id)
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_zero_slots_rejected() {
        let err = Executor::new(0).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidConfig(_)));
    }

    #[test]
    fn test_excess_submissions_queue() {
        let executor = Executor::new(1).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let blocker = executor.submit(move || {
            let _ = release_rx.recv();
            "first"
        });
        let queued = executor.submit(|| "second");

        let stats = executor.stats();
        assert_eq!(stats.available_slots, 0);
        assert_eq!(stats.queued_tasks, 1);
        assert!(!queued.is_finished());

        release_tx.send(()).unwrap();
        assert_eq!(blocker.result(), Ok(&"first"));
        assert_eq!(queued.result(), Ok(&"second"));
    }

    #[test]
    fn test_slot_returns_after_queue_drains() {
        let executor = Executor::new(2).unwrap();
        let handles: Vec<_> = (0..6).map(|i| executor.submit(move || i)).collect();
        for handle in &handles {
            assert!(handle.result().is_ok());
        }

        // The hook runs just after the outcome is published.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while executor.stats().available_slots < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let stats = executor.stats();
        assert_eq!(stats.available_slots, 2);
        assert_eq!(stats.queued_tasks, 0);
        assert_eq!(stats.submitted_tasks, 6);
    }

    #[test]
    fn test_task_ids_are_sequential() {
        let executor = Executor::new(1).unwrap();
        let a = executor.submit(|| ());
        let b = executor.submit(|| ());
        assert_eq!(b.id(), a.id() + 1);
    }

    #[test]
    fn test_thread_named_from_prefix() {
        let config = ExecutorConfig::new().with_slots(1).with_thread_name_prefix("render");
        let executor = Executor::with_config(config).unwrap();
        let handle = executor.submit(|| thread::current().name().map(ToString::to_string));
        let id = handle.id();
        assert_eq!(handle.result(), Ok(&Some(format!("render-{id}"))));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let executor = Executor::new(1).unwrap();
        executor.shutdown();
        executor.shutdown();
        assert!(executor.is_shutdown());
        assert!(executor.submit(|| 1).is_cancelled());
        assert_eq!(executor.stats().cancelled_tasks, 1);
    }

    /// A stack no OS will map, so every spawn fails.
    const UNSPAWNABLE_STACK: usize = 1 << 50;

    #[test]
    fn test_spawn_failure_hands_slot_to_queued_task() {
        let config = ExecutorConfig::new()
            .with_slots(1)
            .with_thread_stack_size(UNSPAWNABLE_STACK);
        let executor = Executor::with_config(config).unwrap();
        let shared = &executor.shared;
        let hook: Arc<dyn CompletionHook> = Arc::clone(shared) as Arc<dyn CompletionHook>;

        let first = ResultHandle::pending(100, Arc::clone(&hook));
        let queued = ResultHandle::pending(101, hook);
        {
            let mut state = shared.state.lock();
            state.available_slots -= 1;
            state
                .pending
                .push_back(QueuedTask::new(101, || "queued", queued.clone()));
        }

        shared.launch(QueuedTask::new(100, || "first", first.clone()));

        assert!(matches!(first.try_result(), Some(Err(TaskError::SpawnFailed(_)))));
        assert!(matches!(queued.try_result(), Some(Err(TaskError::SpawnFailed(_)))));

        let stats = executor.stats();
        assert_eq!(stats.available_slots, 1);
        assert_eq!(stats.queued_tasks, 0);
        assert_eq!(stats.running_tasks, 0);
        assert_eq!(stats.failed_tasks, 2);
    }
}
