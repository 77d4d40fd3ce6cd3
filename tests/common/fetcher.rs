use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use zendb::execution::PageHandler;
use zendb::models::EntityKind;
use zendb::source::{FetchError, FetchRequest, Fetcher, Payload};

/// One scripted answer for a URL.
#[derive(Debug, Clone)]
pub enum Scripted {
    Body(String),
    Status(u16),
    Transport(&'static str),
}

/// In-memory [`Fetcher`] answering from per-URL scripts.
///
/// Each URL's answers are consumed in order; the last one repeats once the
/// script runs out. Unscripted URLs answer 404.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn script(&self, url: &str, answer: Scripted) -> &Self {
        self.scripts
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(answer);
        self
    }

    pub fn body(&self, url: &str, body: impl Into<String>) -> &Self {
        self.script(url, Scripted::Body(body.into()))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == url).count()
    }

    fn next_answer(&self, url: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock();
        let script = scripts.get_mut(url)?;
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        let url = request.url().as_str().to_string();
        self.calls.lock().push(url.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.next_answer(&url) {
            Some(Scripted::Body(body)) => Ok(body.into_bytes()),
            Some(Scripted::Status(status)) => Err(FetchError::status(url, status)),
            Some(Scripted::Transport(reason)) => Err(FetchError::transport(url, reason)),
            None => Err(FetchError::status(url, 404)),
        }
    }
}

/// Counts pages, records and failures it receives.
#[derive(Debug, Default)]
pub struct CountingHandler {
    pub pages: AtomicUsize,
    pub records: AtomicUsize,
    pub failures: AtomicUsize,
    pub kinds: Mutex<Vec<EntityKind>>,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> usize {
        self.pages.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> usize {
        self.records.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageHandler for CountingHandler {
    async fn on_success(&self, payload: Payload) {
        self.pages.fetch_add(1, Ordering::SeqCst);
        self.records.fetch_add(payload.len(), Ordering::SeqCst);
        self.kinds.lock().push(payload.kind());
    }

    fn on_failure(&self, _error: &FetchError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}
