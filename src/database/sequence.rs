//! Resumable per-resource watermarks.
//!
//! `sequence_table(sequence_name, last_val)` holds the highest key or
//! timestamp committed for each resource. Reads are served from a cache that is
//! reloaded in full on the first read after construction or invalidation.

use sqlx::{PgExecutor, PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::PersistenceError;

#[derive(Debug)]
struct SequenceCache {
    values: HashMap<String, i64>,
    dirty: bool,
}

#[derive(Debug)]
pub struct SequenceStore {
    cache: Mutex<SequenceCache>,
}

impl Default for SequenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceStore {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(SequenceCache {
                values: HashMap::new(),
                dirty: true,
            }),
        }
    }

    /// Last committed watermark for `name`; `0` when the resource has never been written.
    pub async fn fetch(&self, pool: &PgPool, name: &str) -> Result<i64, PersistenceError> {
        let mut cache = self.cache.lock().await;
        if cache.dirty {
            let rows = sqlx::query("SELECT sequence_name, last_val FROM sequence_table")
                .fetch_all(pool)
                .await
                .map_err(|e| PersistenceError::sequence(name, e))?;

            cache.values = rows
                .iter()
                .map(|row| {
                    let last_val: Option<i64> = row.get("last_val");
                    (row.get::<String, _>("sequence_name"), last_val.unwrap_or(0))
                })
                .collect();
            cache.dirty = false;
            debug!(sequences = cache.values.len(), "Sequence cache reloaded");
        }

        Ok(cache.values.get(name).copied().unwrap_or(0))
    }

    /// Force the next [`fetch`](Self::fetch) to reload from the table.
    pub async fn invalidate(&self) {
        self.cache.lock().await.dirty = true;
    }

    /// Raise the stored watermark for `name` to `value`; a lower value leaves it unchanged.
    pub async fn advance<'e, E>(executor: E, name: &str, value: i64) -> Result<(), PersistenceError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "INSERT INTO sequence_table (sequence_name, last_val) VALUES ($1, $2) \
             ON CONFLICT (sequence_name) DO UPDATE \
             SET last_val = GREATEST(sequence_table.last_val, EXCLUDED.last_val)",
        )
        .bind(name)
        .bind(value)
        .execute(executor)
        .await
        .map_err(|e| PersistenceError::sequence(name, e))?;
        Ok(())
    }
}
