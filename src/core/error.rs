//! Error types for executor construction and task outcomes.

use thiserror::Error;

/// Errors produced when building an executor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a handle holds no value.
///
/// A handle resolves to `Err(TaskError)` instead of the work item's return
/// value when the task never ran to completion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task was submitted after the executor shut down and never ran.
    #[error("task was cancelled: executor is shut down")]
    Cancelled,
    /// The work item panicked; carries the panic message.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The operating system refused to start a thread for the task.
    #[error("failed to spawn task thread: {0}")]
    SpawnFailed(String),
    /// An async wait gave up before the outcome arrived. The task itself is
    /// unaffected and the outcome can still be read from the handle.
    #[error("async wait aborted: {0}")]
    WaitAborted(String),
}
