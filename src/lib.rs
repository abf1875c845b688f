//! # Prometheus Slot Executor
//!
//! A bounded-concurrency executor that runs every admitted work item on its
//! own freshly spawned OS thread.
//!
//! Callers submit a work item (a closure, or a callable plus its arguments)
//! and immediately receive a [`ResultHandle`] that will eventually hold the
//! outcome. At most `slots` work items are admitted without queueing; the rest
//! wait in an unbounded FIFO queue and inherit a slot directly from whichever
//! running task finishes next.
//!
//! ## Key Features
//!
//! - **Thread-per-task**: no persistent workers; a slot is an admission
//!   right, not a thread
//! - **Non-blocking submit**: `submit` never waits for outstanding work
//! - **Single-assignment handles**: blocking, bounded, non-blocking and async
//!   observation of one outcome
//! - **Explicit failure outcomes**: a panicking work item resolves its handle
//!   with an error and still frees its slot
//! - **Scoped shutdown**: [`Executor::scope`] and [`ShutdownGuard`] refuse new
//!   work once a scope ends, however it ends
//!
//! ```rust
//! use prometheus_slot_executor::{Executor, TaskError};
//!
//! let executor = Executor::new(2)?;
//! let sum = executor.submit_with((2, 3), |(a, b)| a + b);
//! assert_eq!(sum.result(), Ok(&5));
//!
//! executor.shutdown();
//! let late = executor.submit(|| 0);
//! assert!(late.is_cancelled());
//! assert_eq!(late.result(), Err(TaskError::Cancelled));
//! # Ok::<(), prometheus_slot_executor::ExecutorError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core executor, result handles, and error types.
pub mod core;
/// Configuration models for executors.
pub mod config;
/// Builders to construct executors from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;

pub use crate::config::{ExecutorConfig, ExecutorSetConfig};
pub use crate::core::{
    CompletionHook, Executor, ExecutorError, ExecutorStats, ResultHandle, ShutdownGuard,
    TaskError, TaskId,
};
