//! # Fetch Dispatcher
//!
//! A fixed number of concurrent workers drain a bounded request channel.
//!
//! ## Task lifecycle
//!
//! ```text
//! submit ──► Queued ──► Fetching ─┬─ continuation ──► Queued (same task, new URI)
//!                                 ├─ 429 (sleep) ───► Queued (same task, same URI)
//!                                 └─ complete ──────► released
//! ```
//!
//! External submissions block once the bounded channel is full. Workers
//! re-queue continuations and rate-limit retries through a separate unbounded
//! channel that the dispatch loop always drains first, so a worker never waits
//! on a channel that only workers can empty. Every queued copy holds one task
//! reference and one barrier count, both taken before the send.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::barrier::CompletionBarrier;
use super::error_sink::{ErrorSink, FetchFailure};
use super::task::{PageHandler, Task, TaskPool, TaskState};
use crate::config::DispatcherConfig;
use crate::logging::log_fetch_operation;
use crate::source::{pre_process, FetchError, FetchRequest, Fetcher, Payload};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatcher has been stopped")]
    Stopped,
}

pub struct Dispatcher {
    requests: mpsc::Sender<Arc<Task>>,
    barrier: Arc<CompletionBarrier>,
    pool: Arc<TaskPool>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the dispatch loop on the current runtime.
    pub fn start(fetcher: Arc<dyn Fetcher>, config: &DispatcherConfig) -> Self {
        let (requests, request_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (continuations, continuation_rx) = mpsc::unbounded_channel();
        let barrier = Arc::new(CompletionBarrier::new());
        let pool = Arc::new(TaskPool::new());
        let shutdown = Arc::new(Notify::new());
        let running = Arc::new(AtomicBool::new(true));

        let worker = Arc::new(Worker {
            fetcher,
            pool: Arc::clone(&pool),
            barrier: Arc::clone(&barrier),
            continuations,
            rate_limit_delay: config.rate_limit_delay(),
            page_size_ceiling: config.page_size_ceiling,
        });

        let dispatch = DispatchLoop {
            requests: request_rx,
            continuations: continuation_rx,
            permits: Arc::new(Semaphore::new(config.workers.max(1))),
            shutdown: Arc::clone(&shutdown),
            running: Arc::clone(&running),
            worker,
        };
        let loop_handle = tokio::spawn(dispatch.run());

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            rate_limit_delay_ms = config.rate_limit_delay_ms,
            "🚀 Fetch dispatcher started"
        );

        Self {
            requests,
            barrier,
            pool,
            shutdown,
            running,
            loop_handle: Mutex::new(Some(loop_handle)),
        }
    }

    /// Queue one fetch. Waits while the request channel is full.
    pub async fn submit(
        &self,
        request: FetchRequest,
        handler: Arc<dyn PageHandler>,
        errors: &ErrorSink<FetchFailure>,
    ) -> Result<(), DispatchError> {
        if !self.is_running() {
            return Err(DispatchError::Stopped);
        }

        let task = self.pool.acquire(errors.clone());
        task.bind(request, handler);
        task.add();
        self.barrier.add();
        task.set_state(TaskState::Queued);

        if let Err(mpsc::error::SendError(task)) = self.requests.send(task).await {
            self.barrier.done();
            self.pool.release(&task);
            return Err(DispatchError::Stopped);
        }
        Ok(())
    }

    /// Resolve once every submitted task and all of its continuations have finished.
    ///
    /// Submissions made while waiting extend the wait.
    pub async fn wait(&self) {
        self.barrier.wait().await;
    }

    pub fn barrier(&self) -> &Arc<CompletionBarrier> {
        &self.barrier
    }

    pub fn pool(&self) -> &Arc<TaskPool> {
        &self.pool
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop consuming. Queued tasks are abandoned, not drained; fetches already
    /// running on a worker finish on their own.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.shutdown.notify_one();

        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Dispatch loop terminated abnormally");
            }
            info!(
                outstanding = self.barrier.outstanding(),
                "🛑 Fetch dispatcher stopped"
            );
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.shutdown.notify_one();
    }
}

struct DispatchLoop {
    requests: mpsc::Receiver<Arc<Task>>,
    continuations: mpsc::UnboundedReceiver<Arc<Task>>,
    permits: Arc<Semaphore>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
    worker: Arc<Worker>,
}

impl DispatchLoop {
    async fn run(mut self) {
        loop {
            let task = tokio::select! {
                biased;
                _ = self.shutdown.notified() => break,
                Some(task) = self.continuations.recv() => task,
                Some(task) = self.requests.recv() => task,
                else => break,
            };

            let permit = tokio::select! {
                biased;
                _ = self.shutdown.notified() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let worker = Arc::clone(&self.worker);
            tokio::spawn(async move {
                worker.process(task).await;
                drop(permit);
            });
        }

        self.running.store(false, Ordering::Release);
        debug!("Dispatch loop exited");
    }
}

struct Worker {
    fetcher: Arc<dyn Fetcher>,
    pool: Arc<TaskPool>,
    barrier: Arc<CompletionBarrier>,
    continuations: mpsc::UnboundedSender<Arc<Task>>,
    rate_limit_delay: Duration,
    page_size_ceiling: i64,
}

impl Worker {
    #[instrument(skip_all, fields(task_id = task.id()))]
    async fn process(&self, task: Arc<Task>) {
        task.set_state(TaskState::Fetching);

        match task.request() {
            Some(request) => self.fetch(&task, request).await,
            None => warn!("Dequeued a task with no request bound"),
        }

        self.pool.release(&task);
        self.barrier.done();
    }

    async fn fetch(&self, task: &Arc<Task>, request: FetchRequest) {
        let handler = task.handler();

        match self.fetcher.fetch(&request).await {
            Ok(body) => self.handle_body(task, &request, handler, &body).await,
            Err(e) if e.is_rate_limited() => {
                warn!(
                    uri = %request,
                    delay_ms = self.rate_limit_delay.as_millis() as u64,
                    "⏳ Request limit hit, re-queueing after delay"
                );
                tokio::time::sleep(self.rate_limit_delay).await;
                self.requeue(task);
            }
            Err(e) if e.is_not_found() => {
                info!(uri = %request, "No resource available, dropping fetch");
            }
            Err(e) => {
                log_fetch_operation(
                    "fetch",
                    request.url().as_str(),
                    "failed",
                    e.status_code(),
                    Some(&e.to_string()),
                );
                self.fail(task, handler.as_deref(), e);
            }
        }
    }

    async fn handle_body(
        &self,
        task: &Arc<Task>,
        request: &FetchRequest,
        handler: Option<Arc<dyn PageHandler>>,
        body: &[u8],
    ) {
        let descriptor = match pre_process(body) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!(uri = %request, error = %e, "Response body is not a JSON object");
                self.fail(task, handler.as_deref(), FetchError::decode(request.url().as_str(), e));
                return;
            }
        };

        if let Some(next) = descriptor.continuation(request, self.page_size_ceiling) {
            debug!(uri = %next, "Placing continuation on the queue");
            task.set_request(FetchRequest::new(next));
            self.requeue(task);
        }

        let (Some(resource), Some(raw)) = (descriptor.resource, descriptor.payload) else {
            debug!(uri = %request, "No recognised resource in response, dropping");
            return;
        };

        match Payload::decode(resource, raw) {
            Ok(payload) => {
                debug!(uri = %request, resource = %resource, records = payload.len(), "Page decoded");
                if let Some(handler) = handler {
                    handler.on_success(payload).await;
                }
            }
            Err(e) => {
                error!(uri = %request, resource = %resource, error = %e, "Failed to deserialize payload");
                self.fail(task, handler.as_deref(), FetchError::decode(request.url().as_str(), e));
            }
        }
    }

    fn fail(&self, task: &Task, handler: Option<&dyn PageHandler>, error: FetchError) {
        let uri = match &error {
            FetchError::Transport { uri, .. }
            | FetchError::Status { uri, .. }
            | FetchError::Decode { uri, .. }
            | FetchError::InvalidUri { uri, .. } => uri.clone(),
            FetchError::Client(_) => String::new(),
        };
        task.errors().push(FetchFailure {
            uri,
            status: error.status_code(),
            error: error.to_string(),
        });
        if let Some(handler) = handler {
            handler.on_failure(&error);
        }
    }

    /// Put `task` back on the queue as an additional in-flight copy.
    fn requeue(&self, task: &Arc<Task>) {
        task.add();
        self.barrier.add();
        task.set_state(TaskState::Queued);

        if self.continuations.send(Arc::clone(task)).is_err() {
            warn!(task_id = task.id(), "Dispatcher stopped, dropping re-queued task");
            self.pool.release(task);
            self.barrier.done();
        }
    }
}
