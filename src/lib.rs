#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # zendb
//!
//! Incremental extraction of Zendesk data into PostgreSQL.
//!
//! ## Overview
//!
//! A run pulls field definitions, groups, organizations, users, tickets,
//! satisfaction ratings and per-ticket audits and metrics from the Zendesk
//! REST API and upserts them into one table per entity kind, resuming every
//! incremental export from the watermark committed by the previous run.
//!
//! ## Architecture
//!
//! Two subsystems carry the run:
//!
//! - a **fetch dispatcher**: a fixed pool of workers draining a bounded queue,
//!   surviving rate limits, following pagination by re-queueing the same task,
//!   and exposing a completion barrier that stages wait on;
//! - a **persistence layer**: explicit column mappings turned into cached
//!   INSERT/UPDATE statements, transactional batch writes with duplicate-key
//!   fallback to update, and a sequence table of watermarks.
//!
//! ## Module Organization
//!
//! - [`source`] - HTTP fetcher, response pre-processor, payload decoding, endpoints
//! - [`execution`] - tasks, task pool, completion barrier, error sinks, dispatcher
//! - [`database`] - connection, statement synthesis, sequences, transforms, persistence
//! - [`models`] - entity records and their column mappings
//! - [`pipeline`] - stage orchestration, extraction transforms, scheduling
//! - [`config`] - configuration management
//! - [`error`] - structured error handling
//! - [`logging`] - structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zendb::config::ConfigManager;
//! use zendb::database::{DatabaseConnection, Persistence};
//! use zendb::execution::Dispatcher;
//! use zendb::pipeline::Orchestrator;
//! use zendb::source::{HttpFetcher, ZendeskSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load("config/zendb.toml")?;
//! let config = manager.config();
//!
//! let connection = DatabaseConnection::connect(&config.database).await?;
//! let fetcher = HttpFetcher::new(&config.zendesk, config.dispatcher.request_timeout())?;
//! let dispatcher = Arc::new(Dispatcher::start(Arc::new(fetcher), &config.dispatcher));
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::clone(&dispatcher),
//!     Persistence::from_connection(&connection),
//!     ZendeskSource::new(&config.zendesk)?,
//!     config.pipeline.clone(),
//! );
//! let report = orchestrator.run().await;
//! report.log();
//! dispatcher.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live beside the code. Tests that need PostgreSQL are gated
//! behind the `test-db` feature and read `DATABASE_URL`.

pub mod config;
pub mod database;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod source;

pub use config::{ConfigManager, ConfigurationError, ZendbConfig};
pub use database::{DatabaseConnection, ImportSummary, Persistence, PersistenceError};
pub use error::{Result, ZendbError};
pub use execution::{CompletionBarrier, DispatchError, Dispatcher, ErrorSink, PageHandler};
pub use models::{Entity, EntityKind, Record};
pub use pipeline::{Orchestrator, RunReport};
pub use source::{FetchError, FetchRequest, Fetcher, HttpFetcher, ZendeskSource};
