//! Core executor, result handles, and error types.

pub mod error;
pub mod executor;
pub mod handle;
pub mod task;

pub use error::{ExecutorError, TaskError};
pub use executor::{Executor, ExecutorStats, ShutdownGuard};
pub use handle::{CompletionHook, ResultHandle};
pub use task::TaskId;
