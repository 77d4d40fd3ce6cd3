//! # Batch Persistence
//!
//! [`Persistence`] owns everything a write needs: the pool, the statement
//! cache, the sequence cache, the transform registry and the sink-side error
//! queue. One instance is shared by every page handler of a run.
//!
//! ## Import flow
//!
//! 1. Begin one transaction for the batch and prepare its statements. A
//!    failure here abandons the batch and is returned to the caller.
//! 2. For each record: run transforms, then INSERT inside a savepoint. A
//!    unique violation rolls the savepoint back and retries as UPDATE. Any
//!    other failure is queued and the batch continues.
//! 3. Advance the kind's watermark to the highest value among written
//!    records, inside the same transaction, then commit. A failure here rolls
//!    the whole batch back.
//!
//! Every abandoned batch leaves one record-less [`WriteFailure`] in the sink.

use serde::Serialize;
use sqlx::{Connection, Executor, PgConnection, PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::error_codes::PgErrorCode;
use super::sequence::SequenceStore;
use super::statements::{StatementCache, Statements};
use super::transform::{Transform, TransformRegistry};
use super::{DatabaseConnection, PersistenceError};
use crate::execution::{ErrorSink, WriteFailure};
use crate::logging::log_database_operation;
use crate::models::{EntityKind, Record, SqlValue};

/// Outcome of one [`Persistence::import`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub kind: EntityKind,
    pub inserted: usize,
    pub updated: usize,
    /// Records a transform dropped
    pub dropped: usize,
    /// Records routed to the error sink
    pub failed: usize,
    /// Highest watermark among written records
    pub watermark: Option<i64>,
}

impl ImportSummary {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            inserted: 0,
            updated: 0,
            dropped: 0,
            failed: 0,
            watermark: None,
        }
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    fn observe(&mut self, watermark: Option<i64>) {
        if let Some(mark) = watermark {
            self.watermark = Some(self.watermark.map_or(mark, |current| current.max(mark)));
        }
    }
}

enum Written {
    Inserted,
    Updated,
}

#[derive(Debug)]
pub struct Persistence {
    pool: PgPool,
    statements: StatementCache,
    sequences: SequenceStore,
    transforms: TransformRegistry,
    errors: ErrorSink<WriteFailure>,
}

impl Persistence {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statements: StatementCache::new(),
            sequences: SequenceStore::new(),
            transforms: TransformRegistry::new(),
            errors: ErrorSink::new(),
        }
    }

    pub fn from_connection(connection: &DatabaseConnection) -> Arc<Self> {
        Arc::new(Self::new(connection.pool().clone()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Sink-side failures queued so far
    pub fn errors(&self) -> &ErrorSink<WriteFailure> {
        &self.errors
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    /// Attach a pre-write transform to every future import of `kind`.
    pub fn register_transformation(&self, kind: EntityKind, transform: impl Transform + 'static) {
        self.transforms.register(kind, transform);
        debug!(
            kind = %kind,
            registered = self.transforms.count(kind),
            "Transform registered"
        );
    }

    /// Upsert a homogeneous batch in one transaction.
    #[instrument(skip(self, records), fields(table = T::KIND.table_name(), records = records.len()))]
    pub async fn import<T: Record>(&self, records: Vec<T>) -> Result<ImportSummary, PersistenceError> {
        let kind = T::KIND;
        let table = kind.table_name();
        let mut summary = ImportSummary::new(kind);

        if records.is_empty() {
            debug!(table, "Empty batch, nothing to import");
            return Ok(summary);
        }

        let started = Instant::now();
        let statements = self.statements.get::<T>();

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(source) => {
                self.abandon(table, &source);
                return Err(PersistenceError::Begin { table, source });
            }
        };

        if let Err(source) = prepare(&mut tx, &statements).await {
            self.abandon(table, &source);
            rollback(tx, table).await;
            return Err(PersistenceError::Prepare { table, source });
        }

        for record in records {
            let Some(entity) = self.transforms.apply(record.into()) else {
                summary.dropped += 1;
                continue;
            };

            let record = match T::try_from(entity) {
                Ok(record) => record,
                Err(other) => {
                    warn!(table, returned = %other.kind(), "Transform changed the entity kind");
                    self.errors.push(WriteFailure {
                        table,
                        record: Some(other),
                        error: format!("transform returned a record that is not {table}"),
                    });
                    summary.failed += 1;
                    continue;
                }
            };

            match write(&mut tx, &statements, record.values()).await {
                Ok(Written::Inserted) => summary.inserted += 1,
                Ok(Written::Updated) => summary.updated += 1,
                Err(e) => {
                    debug!(table, error = %e, "Record write failed");
                    self.errors.push(WriteFailure {
                        table,
                        record: Some(record.into()),
                        error: e.to_string(),
                    });
                    summary.failed += 1;
                    continue;
                }
            }
            summary.observe(record.watermark());
        }

        if let Some(mark) = summary.watermark {
            if let Err(e) = SequenceStore::advance(&mut *tx, table, mark).await {
                self.abandon(table, &e);
                rollback(tx, table).await;
                return Err(e);
            }
        }

        if let Err(source) = tx.commit().await {
            self.abandon(table, &source);
            return Err(PersistenceError::Commit { table, source });
        }

        if summary.watermark.is_some() {
            self.sequences.invalidate().await;
        }

        log_database_operation(
            "import",
            Some(table),
            Some(summary.written()),
            if summary.failed == 0 { "success" } else { "partial" },
            Some(started.elapsed().as_millis() as u64),
            Some(&format!(
                "inserted={} updated={} dropped={} failed={}",
                summary.inserted, summary.updated, summary.dropped, summary.failed
            )),
        );

        Ok(summary)
    }

    /// Last committed watermark for a resource; `0` when none has been committed.
    pub async fn fetch_offset(&self, name: &str) -> Result<i64, PersistenceError> {
        self.sequences.fetch(&self.pool, name).await
    }

    /// Raise a resource's watermark outside of an import. Never lowers it.
    pub async fn commit_sequence(&self, name: &str, value: i64) -> Result<(), PersistenceError> {
        SequenceStore::advance(&self.pool, name, value).await?;
        self.sequences.invalidate().await;
        debug!(sequence = name, value, "Sequence committed");
        Ok(())
    }

    /// Run arbitrary SQL (possibly several statements) outside any transaction.
    pub async fn exec_raw(&self, sql: &str) -> Result<u64, PersistenceError> {
        let started = Instant::now();
        let result = sqlx::raw_sql(sql).execute(&self.pool).await?;
        log_database_operation(
            "exec_raw",
            None,
            Some(result.rows_affected() as usize),
            "success",
            Some(started.elapsed().as_millis() as u64),
            None,
        );
        Ok(result.rows_affected())
    }

    /// Queue a batch-level failure: nothing from this batch was written.
    fn abandon(&self, table: &'static str, source: &dyn std::fmt::Display) {
        self.errors.push(WriteFailure {
            table,
            record: None,
            error: source.to_string(),
        });
    }
}

async fn prepare(tx: &mut Transaction<'static, Postgres>, statements: &Statements) -> Result<(), sqlx::Error> {
    let conn: &mut PgConnection = tx;
    (&mut *conn).prepare(statements.insert.as_str()).await?;
    if let Some(update) = statements.update.as_deref() {
        (&mut *conn).prepare(update).await?;
    }
    Ok(())
}

async fn rollback(tx: Transaction<'static, Postgres>, table: &'static str) {
    if let Err(e) = tx.rollback().await {
        warn!(table, error = %e, "Rollback failed");
    }
}

async fn write(
    tx: &mut Transaction<'static, Postgres>,
    statements: &Statements,
    values: Vec<SqlValue>,
) -> Result<Written, sqlx::Error> {
    match execute_in_savepoint(tx, &statements.insert, values.clone()).await {
        Ok(()) => Ok(Written::Inserted),
        Err(e) if PgErrorCode::is_duplicate_key(&e) => {
            if let Some(update) = statements.update.as_deref() {
                execute_in_savepoint(tx, update, statements.update_values(values)).await?;
            }
            Ok(Written::Updated)
        }
        Err(e) => Err(e),
    }
}

async fn execute_in_savepoint(
    conn: &mut PgConnection,
    sql: &str,
    values: Vec<SqlValue>,
) -> Result<(), sqlx::Error> {
    let mut savepoint = conn.begin().await?;
    let query = values
        .into_iter()
        .fold(sqlx::query(sql), |query, value| value.bind(query));

    match query.execute(&mut *savepoint).await {
        Ok(_) => savepoint.commit().await,
        Err(e) => {
            if let Err(rollback) = savepoint.rollback().await {
                warn!(error = %rollback, "Savepoint rollback failed");
            }
            Err(e)
        }
    }
}
