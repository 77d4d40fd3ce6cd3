//! Dispatcher behaviour against a scripted fetcher: pagination, rate limits,
//! failure routing, backpressure and shutdown.

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;

use zendb::execution::{DispatchError, Dispatcher, ErrorSink, FetchFailure};
use zendb::source::FetchRequest;

fn request(path: &str) -> FetchRequest {
    FetchRequest::parse(&url(path)).unwrap()
}

async fn settle(dispatcher: &Dispatcher) {
    tokio::time::timeout(Duration::from_secs(5), dispatcher.wait())
        .await
        .expect("dispatcher should drain");
}

#[tokio::test]
async fn test_incremental_pagination_follows_full_pages_only() {
    let first = url("incremental/tickets.json?start_time=0");
    let second = url("incremental/tickets.json?start_time=100");
    let third = url("incremental/tickets.json?start_time=200");

    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .body(&first, page("tickets", records(1, 3), 1000, Some(&second)))
        .body(&second, page("tickets", records(4, 3), 1000, Some(&third)))
        .body(&third, page("tickets", records(7, 2), 2, Some(&url("incremental/tickets.json?start_time=300"))));

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(4, 8));
    let handler = Arc::new(CountingHandler::new());
    let errors = ErrorSink::new();

    dispatcher
        .submit(FetchRequest::parse(&first).unwrap(), handler.clone(), &errors)
        .await
        .unwrap();
    settle(&dispatcher).await;

    assert_eq!(handler.pages(), 3);
    assert_eq!(handler.records(), 8);
    assert_eq!(fetcher.calls().len(), 3);
    assert_eq!(dispatcher.barrier().outstanding(), 0);
    assert!(errors.is_empty());

    // One logical fetch, one task, back on the free list
    assert_eq!(dispatcher.pool().allocated(), 1);
    assert_eq!(dispatcher.pool().available(), 1);
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_list_endpoint_follows_next_page_until_null() {
    let first = url("groups.json");
    let second = url("groups.json?page=2");

    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .body(&first, page("groups", records(1, 100), 150, Some(&second)))
        .body(&second, page("groups", records(101, 50), 150, None));

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(2, 4));
    let handler = Arc::new(CountingHandler::new());

    dispatcher
        .submit(request("groups.json"), handler.clone(), &ErrorSink::new())
        .await
        .unwrap();
    settle(&dispatcher).await;

    assert_eq!(handler.pages(), 2);
    assert_eq!(handler.records(), 150);
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_rate_limited_request_is_retried_unchanged() {
    let target = url("tickets/7/metrics.json");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .script(&target, Scripted::Status(429))
        .body(&target, r#"{"ticket_metric": {"id": 70, "ticket_id": 7}}"#);

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(2, 4));
    let handler = Arc::new(CountingHandler::new());
    let errors = ErrorSink::new();

    dispatcher
        .submit(request("tickets/7/metrics.json"), handler.clone(), &errors)
        .await
        .unwrap();
    settle(&dispatcher).await;

    assert_eq!(fetcher.calls_to(&target), 2);
    assert_eq!(handler.pages(), 1);
    assert_eq!(handler.records(), 1);
    assert_eq!(handler.failures(), 0);
    assert!(errors.is_empty());
    assert_eq!(dispatcher.pool().allocated(), 1);
    assert_eq!(dispatcher.pool().available(), 1);
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_not_found_is_dropped_silently() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(1, 1));
    let handler = Arc::new(CountingHandler::new());
    let errors = ErrorSink::new();

    dispatcher
        .submit(request("tickets/404/audits.json"), handler.clone(), &errors)
        .await
        .unwrap();
    settle(&dispatcher).await;

    assert_eq!(handler.pages(), 0);
    assert_eq!(handler.failures(), 0);
    assert!(errors.is_empty());
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_hard_failures_reach_the_error_sink_once() {
    let broken = url("users/1.json");
    let unreachable = url("organizations/1.json");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .script(&broken, Scripted::Status(500))
        .script(&unreachable, Scripted::Transport("connection reset"));

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(2, 4));
    let handler = Arc::new(CountingHandler::new());
    let errors: ErrorSink<FetchFailure> = ErrorSink::new();

    dispatcher
        .submit(request("users/1.json"), handler.clone(), &errors)
        .await
        .unwrap();
    dispatcher
        .submit(request("organizations/1.json"), handler.clone(), &errors)
        .await
        .unwrap();
    settle(&dispatcher).await;

    let mut failures = errors.drain();
    failures.sort_by(|a, b| a.uri.cmp(&b.uri));
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].uri, unreachable);
    assert_eq!(failures[0].status, None);
    assert_eq!(failures[1].uri, broken);
    assert_eq!(failures[1].status, Some(500));
    assert_eq!(handler.failures(), 2);
    assert_eq!(fetcher.calls().len(), 2);
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_malformed_payload_is_reported_as_decode_failure() {
    let target = url("groups.json");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.body(&target, r#"{"groups": [{"id": "not-a-number"}], "count": 1}"#);

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(1, 1));
    let handler = Arc::new(CountingHandler::new());
    let errors = ErrorSink::new();

    dispatcher
        .submit(request("groups.json"), handler.clone(), &errors)
        .await
        .unwrap();
    settle(&dispatcher).await;

    let failures = errors.drain();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].error.contains("decode"));
    assert_eq!(handler.pages(), 0);
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_unrecognised_body_is_dropped() {
    let target = url("groups.json");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.body(&target, r#"{"something_else": [], "count": 0}"#);

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(1, 1));
    let handler = Arc::new(CountingHandler::new());
    let errors = ErrorSink::new();

    dispatcher
        .submit(request("groups.json"), handler.clone(), &errors)
        .await
        .unwrap();
    settle(&dispatcher).await;

    assert_eq!(handler.pages(), 0);
    assert!(errors.is_empty());
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_single_worker_with_tiny_queue_never_deadlocks_on_continuations() {
    let fetcher = Arc::new(ScriptedFetcher::with_latency(Duration::from_millis(1)));
    for export in 0..5 {
        let pages: Vec<String> = (0..4)
            .map(|p| url(&format!("incremental/users.json?start_time={}", export * 100 + p)))
            .collect();
        for (p, page_url) in pages.iter().enumerate() {
            let next = pages.get(p + 1).map(String::as_str);
            let count = if next.is_some() { 1000 } else { 1 };
            fetcher.body(page_url, page("users", records(1, 1), count, next));
        }
    }

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(1, 1));
    let handler = Arc::new(CountingHandler::new());
    let errors = ErrorSink::new();

    for export in 0..5 {
        let first = url(&format!("incremental/users.json?start_time={}", export * 100));
        dispatcher
            .submit(FetchRequest::parse(&first).unwrap(), handler.clone(), &errors)
            .await
            .unwrap();
    }
    settle(&dispatcher).await;

    assert_eq!(handler.pages(), 20);
    assert_eq!(fetcher.calls().len(), 20);
    assert!(dispatcher.pool().allocated() <= 5);
    assert_eq!(dispatcher.pool().available(), dispatcher.pool().allocated());
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_continuation_to_the_same_page_is_not_followed() {
    let target = url("incremental/tickets.json?start_time=0");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.body(&target, page("tickets", records(1, 1), 1000, Some(&target)));

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(1, 1));
    let handler = Arc::new(CountingHandler::new());

    dispatcher
        .submit(FetchRequest::parse(&target).unwrap(), handler.clone(), &ErrorSink::new())
        .await
        .unwrap();
    settle(&dispatcher).await;

    assert_eq!(fetcher.calls_to(&target), 1);
    assert_eq!(handler.pages(), 1);
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_stop_abandons_queued_tasks() {
    let fetcher = Arc::new(ScriptedFetcher::with_latency(Duration::from_millis(200)));
    let urls: Vec<String> = (0..5).map(|n| url(&format!("groups.json?page={n}"))).collect();
    for page_url in &urls {
        fetcher.body(page_url, page("groups", records(1, 1), 1, None));
    }

    let dispatcher = Dispatcher::start(fetcher.clone(), &dispatcher_config(1, 8));
    let handler = Arc::new(CountingHandler::new());
    let errors = ErrorSink::new();
    for page_url in &urls {
        dispatcher
            .submit(FetchRequest::parse(page_url).unwrap(), handler.clone(), &errors)
            .await
            .unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while fetcher.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first fetch should start");

    dispatcher.stop().await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(fetcher.calls(), vec![urls[0].clone()]);
    assert_eq!(handler.pages(), 1);
    assert_eq!(dispatcher.barrier().outstanding(), 4);
    assert!(errors.is_empty());
    assert!(
        tokio::time::timeout(Duration::from_millis(100), dispatcher.wait())
            .await
            .is_err()
    );

    let late = dispatcher
        .submit(request("groups.json"), handler.clone(), &errors)
        .await;
    assert!(matches!(late, Err(DispatchError::Stopped)));
}

#[tokio::test]
async fn test_submit_after_stop_is_rejected() {
    let dispatcher = Dispatcher::start(Arc::new(ScriptedFetcher::new()), &dispatcher_config(1, 1));
    dispatcher.stop().await;
    assert!(!dispatcher.is_running());

    let result = dispatcher
        .submit(request("groups.json"), Arc::new(CountingHandler::new()), &ErrorSink::new())
        .await;
    assert!(matches!(result, Err(DispatchError::Stopped)));
    assert_eq!(dispatcher.barrier().outstanding(), 0);
}

#[tokio::test]
async fn test_wait_with_nothing_submitted_returns_immediately() {
    let dispatcher = Dispatcher::start(Arc::new(ScriptedFetcher::new()), &dispatcher_config(1, 1));
    tokio_test::assert_ok!(
        tokio::time::timeout(Duration::from_millis(100), dispatcher.wait()).await
    );
    dispatcher.stop().await;
}
