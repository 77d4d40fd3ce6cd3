//! PostgreSQL SQLSTATE codes the persistence layer branches on.
//!
//! Full list: <https://www.postgresql.org/docs/current/errcodes-appendix.html>

/// PostgreSQL SQLSTATE error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PgErrorCode;

impl PgErrorCode {
    /// Duplicate key on a primary key or unique constraint. Selects the update path of an upsert.
    pub const UNIQUE_VIOLATION: &'static str = "23505";

    #[inline]
    pub fn is_unique_violation(code: &str) -> bool {
        code == Self::UNIQUE_VIOLATION
    }

    /// True when `error` is a database error carrying the unique-violation code
    pub fn is_duplicate_key(error: &sqlx::Error) -> bool {
        match error {
            sqlx::Error::Database(db_err) => db_err
                .code()
                .as_deref()
                .is_some_and(Self::is_unique_violation),
            _ => false,
        }
    }
}
