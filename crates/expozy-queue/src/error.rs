//! Queue-specific error taxonomy.

use expozy_core::OrchestratorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QueueError> for OrchestratorError {
    fn from(err: QueueError) -> Self {
        Self::Queue(err.to_string())
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
