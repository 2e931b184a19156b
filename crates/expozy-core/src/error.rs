//! Unified error type for all layers of the orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type shared by the store, queue, validator, ingest, and
/// worker layers.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A request or payload failed validation before any state was mutated.
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation would create a row that already exists (unique
    /// constraint). Callers treat this as "already handled", not a failure.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A compare-and-set style mutation found the row in an unexpected
    /// prior state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requested row does not exist.
    #[error("not found: {resource} {id}")]
    NotFound { resource: &'static str, id: String },

    /// Authentication against the shared webhook secret failed.
    #[error("unauthorized")]
    Unauthorized,

    /// Durable storage error (Postgres).
    #[error("store error: {0}")]
    Store(String),

    /// Queue error (Redis).
    #[error("queue error: {0}")]
    Queue(String),

    /// The generative model adapter returned an error or could not be
    /// reached.
    #[error("model adapter error: {0}")]
    ModelAdapter(String),

    /// An operation exceeded its allotted time budget.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Configuration is missing or malformed; fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Catch-all for unexpected internal failures.
    #[error("internal error: {0}")]
    Internal(String),

    /// Generic wrapped error from a dependency that has no dedicated
    /// variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// HTTP status code this error should surface as, when it crosses the
    /// ingest boundary.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Duplicate(_) => 200,
            Self::Conflict(_) => 409,
            Self::NotFound { .. } => 404,
            Self::Unauthorized => 401,
            Self::Timeout(_) => 503,
            Self::Store(_)
            | Self::Queue(_)
            | Self::ModelAdapter(_)
            | Self::Configuration(_)
            | Self::Internal(_)
            | Self::Other(_) => 500,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Duplicate(_) => "DUPLICATE",
            Self::Conflict(_) => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Store(_) => "STORE_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::ModelAdapter(_) => "MODEL_ADAPTER_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this failure is worth retrying (transient infrastructure or
    /// model-side failures), as opposed to a permanent rejection.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Queue(_) | Self::ModelAdapter(_) | Self::Timeout(_)
        )
    }

    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource: "row",
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some("23505") {
                    return Self::Duplicate(db_err.message().to_string());
                }
                Self::Store(err.to_string())
            }
            _ => Self::Store(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for OrchestratorError {
    fn from(err: redis::RedisError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for OrchestratorError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {err}"))
    }
}

/// Serializable error body returned by the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&OrchestratorError> for ErrorResponse {
    fn from(error: &OrchestratorError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(OrchestratorError::validation("bad").status_code(), 400);
        assert_eq!(OrchestratorError::Unauthorized.status_code(), 401);
        assert_eq!(OrchestratorError::conflict("dup").status_code(), 409);
        assert_eq!(
            OrchestratorError::not_found("job", "1").status_code(),
            404
        );
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(OrchestratorError::Store("down".into()).is_retryable());
        assert!(OrchestratorError::ModelAdapter("429".into()).is_retryable());
        assert!(!OrchestratorError::validation("bad").is_retryable());
        assert!(!OrchestratorError::Unauthorized.is_retryable());
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let err = OrchestratorError::not_found("job", "abc");
        let resp = ErrorResponse::from(&err);
        assert_eq!(resp.code, "NOT_FOUND");
        assert!(resp.message.contains("abc"));
    }
}
