use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Notify;
use tracing::error;

/// Counts outstanding fetch work across submissions and their continuations.
///
/// `add` must happen before the work becomes visible to a consumer, and every
/// dequeue calls `done` exactly once, so the count reaches zero only when no
/// task (continuations included) remains in flight.
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    outstanding: AtomicI64,
    notify: Notify,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    pub fn done(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::AcqRel);
        if previous <= 0 {
            self.outstanding.fetch_add(1, Ordering::AcqRel);
            error!(outstanding = previous, "Completion barrier released more often than added");
            return;
        }
        if previous == 1 {
            self.notify.notify_waiters();
        }
    }

    pub fn outstanding(&self) -> i64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Resolve once the outstanding count is zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent `done` cannot be missed
            notified.as_mut().enable();
            if self.outstanding() <= 0 {
                return;
            }
            notified.await;
        }
    }
}
