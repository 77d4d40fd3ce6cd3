//! Crate-wide error type.
//!
//! Each subsystem owns a narrower error enum ([`FetchError`], [`DispatchError`],
//! [`PersistenceError`], [`ConfigurationError`]); [`ZendbError`] unifies them for
//! callers that drive a whole run.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::database::PersistenceError;
use crate::execution::DispatchError;
use crate::source::FetchError;

#[derive(Debug, Error)]
pub enum ZendbError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ZendbError>;
