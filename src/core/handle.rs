//! Single-assignment result handles returned by [`Executor::submit`].
//!
//! A [`ResultHandle`] is written exactly once, by the thread that ran the work
//! item, and may be observed from any number of threads. Publishing follows a
//! fixed order: the outcome is stored, then every waiter is woken, then the
//! executor's [`CompletionHook`] runs. A thread woken by the signal therefore
//! always sees the stored outcome, and the executor only reuses the slot once
//! the outcome is externally visible.
//!
//! [`Executor::submit`]: crate::core::Executor::submit

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use super::error::TaskError;
use super::task::TaskId;

/// Notified on the producing thread once a task's outcome has been published.
///
/// The executor implements this to release or hand over the task's slot.
pub trait CompletionHook: Send + Sync {
    /// Called after the outcome of `task_id` is visible to every observer.
    ///
    /// `succeeded` is false when the work item panicked.
    fn task_completed(&self, task_id: TaskId, succeeded: bool);
}

struct HandleInner<R> {
    id: TaskId,
    value: OnceLock<Result<R, TaskError>>,
    /// Guards the wait on `signal`; the outcome itself lives in `value`.
    gate: Mutex<()>,
    signal: Condvar,
    cancelled: bool,
    hook: Option<Arc<dyn CompletionHook>>,
}

/// Observable, single-assignment outcome of one submitted work item.
///
/// Cloning a handle is cheap; every clone observes the same outcome.
pub struct ResultHandle<R> {
    inner: Arc<HandleInner<R>>,
}

impl<R> Clone for ResultHandle<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for ResultHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("id", &self.inner.id)
            .field("finished", &self.is_finished())
            .field("cancelled", &self.inner.cancelled)
            .finish()
    }
}

impl<R> ResultHandle<R> {
    /// Handle for a task that will run; `hook` fires once it has been produced.
    pub(crate) fn pending(id: TaskId, hook: Arc<dyn CompletionHook>) -> Self {
        Self::build(id, false, Some(hook))
    }

    /// Handle for a submission rejected because the executor was shut down.
    pub(crate) fn cancelled(id: TaskId) -> Self {
        Self::build(id, true, None)
    }

    fn build(id: TaskId, cancelled: bool, hook: Option<Arc<dyn CompletionHook>>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                value: OnceLock::new(),
                gate: Mutex::new(()),
                signal: Condvar::new(),
                cancelled,
                hook,
            }),
        }
    }

    /// Identifier assigned to the task at submission.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Returns `true` once an outcome has been produced. Never blocks.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.value.get().is_some()
    }

    /// Returns `true` if the task was submitted after shutdown and will never run.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled
    }

    /// Non-blocking peek at the outcome.
    ///
    /// Returns `None` while the task is queued or running. A cancelled handle
    /// yields `Some(Err(TaskError::Cancelled))`.
    #[must_use]
    pub fn try_result(&self) -> Option<Result<&R, TaskError>> {
        if let Some(outcome) = self.inner.value.get() {
            return Some(view(outcome));
        }
        if self.inner.cancelled {
            return Some(Err(TaskError::Cancelled));
        }
        None
    }

    /// Returns the task's outcome, blocking the calling thread until it exists.
    ///
    /// A cancelled handle returns `Err(TaskError::Cancelled)` immediately.
    /// Repeated calls return a reference to the same stored value.
    ///
    /// A work item that never returns keeps this call blocked forever; use
    /// [`wait_timeout`](Self::wait_timeout) to bound the wait.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Cancelled`] if the task was submitted after shutdown
    /// - [`TaskError::Panicked`] if the work item panicked
    /// - [`TaskError::SpawnFailed`] if no thread could be started for it
    pub fn result(&self) -> Result<&R, TaskError> {
        if let Some(outcome) = self.try_result() {
            return outcome;
        }

        let mut gate = self.inner.gate.lock();
        loop {
            // The producer stores the outcome before taking `gate` to notify,
            // so a check made while holding `gate` cannot miss the wakeup.
            if let Some(outcome) = self.inner.value.get() {
                return view(outcome);
            }
            self.inner.signal.wait(&mut gate);
        }
    }

    /// Waits up to `timeout` for the handle to resolve.
    ///
    /// Returns `true` if the handle is finished or cancelled. This bounds the
    /// caller's wait only; the task keeps running.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.try_result().is_some() {
            return true;
        }

        // A timeout past the end of `Instant` is treated as unbounded.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            let _ = self.result();
            return true;
        };
        let mut gate = self.inner.gate.lock();
        while self.inner.value.get().is_none() {
            if self.inner.signal.wait_until(&mut gate, deadline).timed_out() {
                return self.inner.value.get().is_some();
            }
        }
        true
    }

    /// Stores the outcome and wakes every waiter, without notifying the hook.
    ///
    /// Returns `false` if an outcome had already been produced.
    pub(crate) fn publish(&self, outcome: Result<R, TaskError>) -> bool {
        if self.inner.value.set(outcome).is_err() {
            warn!(task_id = self.inner.id, "outcome already produced, ignoring second write");
            return false;
        }
        let _gate = self.inner.gate.lock();
        self.inner.signal.notify_all();
        true
    }

    /// Producing step: publish the outcome, then notify the completion hook.
    pub(crate) fn complete(&self, outcome: Result<R, TaskError>) {
        let succeeded = outcome.is_ok();
        if !self.publish(outcome) {
            return;
        }
        if let Some(hook) = &self.inner.hook {
            hook.task_completed(self.inner.id, succeeded);
        }
    }
}

#[cfg(feature = "tokio-runtime")]
impl<R> ResultHandle<R>
where
    R: Send + Sync + 'static,
{
    /// Awaits the outcome from async code.
    ///
    /// The blocking wait is moved onto tokio's blocking thread pool so the
    /// calling runtime is never stalled.
    ///
    /// The blocking wait outlives this future: dropping the future does not
    /// stop it. If the work item never returns, the wait stays parked on the
    /// completion signal forever, and because tokio's runtime shutdown waits
    /// for blocking tasks, dropping the runtime hangs as well.
    ///
    /// # Errors
    ///
    /// Same as [`result`](Self::result), plus [`TaskError::WaitAborted`] if
    /// the blocking wait could not complete (runtime shutting down).
    pub async fn wait_async(&self) -> Result<&R, TaskError> {
        if let Some(outcome) = self.try_result() {
            return outcome;
        }

        let handle = self.clone();
        tokio::task::spawn_blocking(move || {
            let _ = handle.result();
        })
        .await
        .map_err(|e| TaskError::WaitAborted(e.to_string()))?;

        self.try_result()
            .unwrap_or_else(|| Err(TaskError::WaitAborted("outcome missing after wait".into())))
    }
}

fn view<R>(outcome: &Result<R, TaskError>) -> Result<&R, TaskError> {
    outcome.as_ref().map_err(Clone::clone)
}
