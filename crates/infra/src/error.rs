//! Store error model.

use thiserror::Error;

use austin_core::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failure.
///
/// These are **infrastructure errors** as opposed to domain errors. Database
/// failures are reported as-is; the enclosing transaction has already been
/// rolled back when the caller sees them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Natural-key collision (e.g. an authority name that already exists).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A write referenced a row that does not exist (e.g. an unknown user id).
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// A row could not be decoded into a domain value.
    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Map an SQLx error to a `StoreError`, keeping the name of the failed operation.
///
/// | PostgreSQL code | Meaning | StoreError |
/// |---|---|---|
/// | `23505` | unique violation | `Conflict` |
/// | `23503` | foreign key violation | `InvalidReference` |
/// | anything else | | `Database` |
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let msg = format!("{operation}: {}", db_err.message());
        match db_err.code().as_deref() {
            Some("23505") => return StoreError::Conflict(msg),
            Some("23503") => return StoreError::InvalidReference(msg),
            _ => {}
        }
    }
    StoreError::Database {
        operation,
        source: err,
    }
}
