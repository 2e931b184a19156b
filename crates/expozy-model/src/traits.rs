//! The generative-model seam: a pluggable interface the
//! Worker invokes and never inspects beyond [`GenerationResult`].

use crate::result::GenerationResult;
use async_trait::async_trait;

#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Generates a template package for `prompt`. Never returns
    /// `Err` — every outcome, including transport failure, is encoded
    /// in the returned record so the Worker's retry decision stays a
    /// pure function of `(retryable, success)`.
    async fn generate(&self, prompt: &str) -> GenerationResult;
}
