//! Type-erased work items waiting for, or holding, an admission slot.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::error::TaskError;
use super::handle::ResultHandle;

/// Identifier of a submitted task, unique within one executor.
pub type TaskId = u64;

type RunFn = Box<dyn FnOnce() + Send + 'static>;
type AbandonFn = Box<dyn FnOnce(TaskError) + Send + 'static>;

/// A work item bound to the handle it will resolve.
///
/// `run` executes the work item and performs the handle's producing step.
/// `abandon` resolves the handle without running anything; it is used when
/// no thread could be started, and does not notify the completion hook.
pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    run: RunFn,
    abandon: AbandonFn,
}

impl QueuedTask {
    pub(crate) fn new<F, R>(id: TaskId, job: F, handle: ResultHandle<R>) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        let abandoned = handle.clone();
        Self {
            id,
            run: Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(job))
                    .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
                handle.complete(outcome);
            }),
            abandon: Box::new(move |err| {
                abandoned.publish(Err(err));
            }),
        }
    }

    pub(crate) fn into_parts(self) -> (TaskId, RunFn, AbandonFn) {
        (self.id, self.run, self.abandon)
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
