//! # Configuration
//!
//! Typed configuration for a zendb run: remote API credentials, database DSN,
//! dispatcher sizing and pipeline extras. Values come from a single file
//! (TOML, JSON or YAML, chosen by extension) layered with `ZENDB__SECTION__KEY`
//! environment overrides.
//!
//! ```rust,no_run
//! use zendb::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load("config/zendb.toml")?;
//! let workers = manager.config().dispatcher.workers;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZendbConfig {
    /// Remote API credentials and location
    pub zendesk: ZendeskConfig,

    /// Relational store connection settings
    pub database: DatabaseConfig,

    /// Fetch worker pool sizing and retry behaviour
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Optional per-run extras
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZendeskConfig {
    pub user: String,
    pub password: String,
    pub subdomain: String,
    /// Overrides `https://{subdomain}.zendesk.com/api/v2/`; used by tests and proxies
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ZendeskConfig {
    /// API root every endpoint is resolved against. Always ends with `/`.
    pub fn api_base(&self) -> String {
        match &self.base_url {
            Some(url) if url.ends_with('/') => url.clone(),
            Some(url) => format!("{url}/"),
            None => format!("https://{}.zendesk.com/api/v2/", self.subdomain),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Apply the bundled migrations on startup
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

/// Fetch dispatcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of concurrent fetch workers
    pub workers: usize,
    /// Capacity of the bounded request channel; producers block once it is full
    pub queue_capacity: usize,
    /// Fixed delay a worker sleeps before re-queueing a rate-limited task
    pub rate_limit_delay_ms: u64,
    /// Incremental exports keep paginating while a page reports at least this many results
    pub page_size_ceiling: i64,
    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout_ms: Option<u64>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 25,
            queue_capacity: 100,
            rate_limit_delay_ms: 60_000,
            page_size_ceiling: 1000,
            request_timeout_ms: Some(60_000),
        }
    }
}

impl DispatcherConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Ticket field titles whose audit change events are extracted; empty keeps every audit
    #[serde(default)]
    pub tracked_change_fields: Vec<String>,
    /// Raw SQL run after every import of a run has finished
    #[serde(default)]
    pub post_processing: Vec<String>,
    /// Re-run the pipeline on this interval instead of exiting after one run
    #[serde(default)]
    pub schedule_interval_seconds: Option<u64>,
}

impl ZendbConfig {
    /// Reject configurations that could never complete a run
    pub fn validate(&self) -> ConfigResult<()> {
        if self.zendesk.subdomain.trim().is_empty() && self.zendesk.base_url.is_none() {
            return Err(ConfigurationError::missing_required_field(
                "subdomain",
                "zendesk",
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("url", "database"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_connections",
                "0",
                "database pool needs at least one connection",
            ));
        }
        if self.dispatcher.workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "workers",
                "0",
                "dispatcher needs at least one worker",
            ));
        }
        if self.dispatcher.queue_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue_capacity",
                "0",
                "request channel capacity must be positive",
            ));
        }
        if self.dispatcher.page_size_ceiling <= 0 {
            return Err(ConfigurationError::invalid_value(
                "page_size_ceiling",
                self.dispatcher.page_size_ceiling.to_string(),
                "page size ceiling must be positive",
            ));
        }
        Ok(())
    }
}
