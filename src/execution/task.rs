//! # Fetch Tasks
//!
//! A [`Task`] is one logical fetch: the request (rewritten in place as pages
//! are followed), the handler that receives decoded pages, and the error sink
//! that receives failures. Tasks are recycled through a [`TaskPool`]; the
//! reference count, not single ownership, decides when a task may go back.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error_sink::{ErrorSink, FetchFailure};
use crate::source::{FetchError, FetchRequest, Payload};

/// Receives the decoded pages of a fetch.
#[async_trait]
pub trait PageHandler: Send + Sync {
    async fn on_success(&self, payload: Payload);

    /// Called for hard failures, after the failure is queued on the task's error sink.
    fn on_failure(&self, error: &FetchError) {
        let _ = error;
    }
}

/// Where a task is in the dispatcher's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pooled,
    Queued,
    Fetching,
}

pub struct Task {
    id: u64,
    request: Mutex<Option<FetchRequest>>,
    handler: Mutex<Option<Arc<dyn PageHandler>>>,
    errors: Mutex<ErrorSink<FetchFailure>>,
    ref_count: AtomicI64,
    state: Mutex<TaskState>,
}

impl Task {
    fn new(id: u64, errors: ErrorSink<FetchFailure>) -> Self {
        Self {
            id,
            request: Mutex::new(None),
            handler: Mutex::new(None),
            errors: Mutex::new(errors),
            ref_count: AtomicI64::new(0),
            state: Mutex::new(TaskState::Pooled),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bind(&self, request: FetchRequest, handler: Arc<dyn PageHandler>) {
        *self.request.lock() = Some(request);
        *self.handler.lock() = Some(handler);
    }

    pub fn request(&self) -> Option<FetchRequest> {
        self.request.lock().clone()
    }

    pub fn set_request(&self, request: FetchRequest) {
        *self.request.lock() = Some(request);
    }

    pub fn handler(&self) -> Option<Arc<dyn PageHandler>> {
        self.handler.lock().clone()
    }

    pub fn errors(&self) -> ErrorSink<FetchFailure> {
        self.errors.lock().clone()
    }

    pub fn add(&self) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one reference; returns the remaining count.
    pub fn done(&self) -> i64 {
        self.ref_count.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn ref_count(&self) -> i64 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        *self.state.lock() = state;
    }

    fn reset(&self, errors: ErrorSink<FetchFailure>) {
        *self.request.lock() = None;
        *self.handler.lock() = None;
        *self.errors.lock() = errors;
        self.ref_count.store(0, Ordering::Release);
        self.set_state(TaskState::Pooled);
    }

    fn clear(&self) {
        *self.request.lock() = None;
        *self.handler.lock() = None;
        self.set_state(TaskState::Pooled);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("request", &self.request.lock().as_ref().map(|r| r.to_string()))
            .field("ref_count", &self.ref_count())
            .field("state", &self.state())
            .finish()
    }
}

/// Free list of reusable tasks.
#[derive(Debug, Default)]
pub struct TaskPool {
    free: Mutex<Vec<Arc<Task>>>,
    allocated: AtomicUsize,
    next_id: AtomicU64,
}

impl TaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cleared task with a zero reference count, bound to `errors`.
    pub fn acquire(&self, errors: ErrorSink<FetchFailure>) -> Arc<Task> {
        if let Some(task) = self.free.lock().pop() {
            task.reset(errors);
            return task;
        }

        self.allocated.fetch_add(1, Ordering::AcqRel);
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        debug!(task_id = id, "Allocating new fetch task");
        Arc::new(Task::new(id, errors))
    }

    /// Drop one reference to `task`, pooling it once nothing references it.
    ///
    /// Returns `true` when the task went back to the free list.
    pub fn release(&self, task: &Arc<Task>) -> bool {
        let remaining = task.done();
        if remaining > 0 {
            return false;
        }
        if remaining < 0 {
            warn!(
                task_id = task.id(),
                ref_count = remaining,
                "Task released more often than it was referenced"
            );
            return false;
        }

        task.clear();
        self.free.lock().push(Arc::clone(task));
        true
    }

    /// Tasks currently on the free list.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Tasks ever created by this pool.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }
}
