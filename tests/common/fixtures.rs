use serde_json::{json, Value};

use zendb::config::DispatcherConfig;

pub const BASE: &str = "https://acme.zendesk.com/api/v2/";

pub fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

/// Small, fast dispatcher settings for tests.
pub fn dispatcher_config(workers: usize, queue_capacity: usize) -> DispatcherConfig {
    DispatcherConfig {
        workers,
        queue_capacity,
        rate_limit_delay_ms: 10,
        page_size_ceiling: 1000,
        request_timeout_ms: None,
    }
}

/// A list page: `{resource: records, count, next_page}`.
pub fn page(resource: &str, records: Vec<Value>, count: i64, next_page: Option<&str>) -> String {
    json!({
        resource: records,
        "count": count,
        "next_page": next_page,
        "previous_page": null,
    })
    .to_string()
}

/// `n` minimal records with ids starting at `first_id`.
pub fn records(first_id: i64, n: usize) -> Vec<Value> {
    (0..n as i64).map(|i| json!({"id": first_id + i})).collect()
}

pub fn ticket(id: i64, status: Option<&str>, updated_at: &str) -> Value {
    json!({
        "id": id,
        "subject": format!("Ticket {id}"),
        "status": status,
        "requester_id": 500,
        "created_at": "2017-01-01T00:00:00Z",
        "updated_at": updated_at,
        "custom_fields": [],
    })
}
