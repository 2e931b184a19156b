//! Store-specific error taxonomy.

use expozy_core::OrchestratorError;
use thiserror::Error;

/// Errors raised by a [`crate::Store`] implementation.
///
/// UNIQUE-violation Postgres errors (SQLSTATE `23505`) are translated here
/// into [`StoreError::Duplicate`]/[`StoreError::Conflict`] at the boundary,
/// never propagated as a raw `sqlx::Error`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the insert (event id, bundle id).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A compare-and-set mutation found the row in an unexpected prior
    /// status.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return Self::Duplicate(db_err.message().to_string());
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return Self::NotFound("row not found".to_string());
        }
        Self::Database(err)
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) => Self::Duplicate(msg),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::NotFound(msg) => Self::not_found("row", msg),
            StoreError::Database(e) => Self::Store(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
