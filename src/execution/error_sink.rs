//! Lock-free error queues.
//!
//! Producers on any worker push failures as they happen; the run drains each
//! sink once at the end. Fetch-side and write-side failures use separate sinks.

use crossbeam::queue::SegQueue;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::models::Entity;

/// Shared, cloneable handle to an unbounded MPMC queue.
pub struct ErrorSink<T> {
    queue: Arc<SegQueue<T>>,
}

impl<T> ErrorSink<T> {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
        }
    }

    pub fn push(&self, failure: T) {
        self.queue.push(failure);
    }

    /// Remove and return everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<T> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// True when both handles feed the same queue
    pub fn same_sink(&self, other: &ErrorSink<T>) -> bool {
        Arc::ptr_eq(&self.queue, &other.queue)
    }
}

impl<T> Clone for ErrorSink<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> Default for ErrorSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ErrorSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink").field("len", &self.len()).finish()
    }
}

/// A request the dispatcher gave up on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub uri: String,
    pub status: Option<u16>,
    pub error: String,
}

/// A record (or whole batch, when `record` is `None`) persistence could not write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteFailure {
    pub table: &'static str,
    pub record: Option<Entity>,
    pub error: String,
}
