//! # Fetch Execution
//!
//! Concurrent execution of remote fetches: pooled [`Task`]s, the
//! [`Dispatcher`] worker pool, the [`CompletionBarrier`] used to sequence
//! stages, and the [`ErrorSink`]s failures are collected in.

pub mod barrier;
pub mod dispatcher;
pub mod error_sink;
pub mod task;

pub use barrier::CompletionBarrier;
pub use dispatcher::{DispatchError, Dispatcher};
pub use error_sink::{ErrorSink, FetchFailure, WriteFailure};
pub use task::{PageHandler, Task, TaskPool, TaskState};
