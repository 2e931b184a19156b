//! Result type aliases used throughout the workspace.

use crate::OrchestratorError;

/// A specialized `Result` for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// A boxed future returning an `OrchestratorResult`, used for trait-object
/// job handlers where `async fn` in a trait isn't enough on its own.
pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = OrchestratorResult<T>> + Send + 'a>>;
