//! # Database Operations
//!
//! PostgreSQL persistence for entity records.
//!
//! ## Key Components
//!
//! - [`connection`] - pool construction and bundled migrations
//! - [`statements`] - INSERT/UPDATE synthesis from explicit column mappings
//! - [`sequence`] - resumable per-resource watermarks in `sequence_table`
//! - [`transform`] - ordered pre-write record transforms per entity kind
//! - [`persistence`] - transactional batch upsert tying the above together

pub mod connection;
pub mod error_codes;
pub mod persistence;
pub mod sequence;
pub mod statements;
pub mod transform;

pub use connection::DatabaseConnection;
pub use error_codes::PgErrorCode;
pub use persistence::{ImportSummary, Persistence};
pub use sequence::SequenceStore;
pub use statements::{quote_ident, StatementCache, Statements};
pub use transform::{Transform, TransformRegistry};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to begin transaction for {table}: {source}")]
    Begin {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to prepare statement for {table}: {source}")]
    Prepare {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to commit batch for {table}: {source}")]
    Commit {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Sequence {name} could not be read or advanced: {source}")]
    Sequence {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),
}

impl PersistenceError {
    pub fn sequence(name: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Sequence {
            name: name.into(),
            source,
        }
    }
}
