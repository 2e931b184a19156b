//! A deterministic [`ModelAdapter`] for tests and local demos: no
//! network, returns a fixed, already-validator-clean template every
//! time (or a configured failure), in place of a live external service.

use crate::result::GenerationResult;
use crate::traits::ModelAdapter;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

enum Behavior {
    Succeed,
    RetryableFailure(String),
    PermanentFailure(String),
}

pub struct EchoAdapter {
    behavior: Mutex<Behavior>,
}

impl EchoAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(Behavior::Succeed),
        }
    }

    #[must_use]
    pub fn always_retryable(reason: impl Into<String>) -> Self {
        Self {
            behavior: Mutex::new(Behavior::RetryableFailure(reason.into())),
        }
    }

    #[must_use]
    pub fn always_permanent(reason: impl Into<String>) -> Self {
        Self {
            behavior: Mutex::new(Behavior::PermanentFailure(reason.into())),
        }
    }

    /// The fixture template this adapter returns on success. Exposed so
    /// tests can assert against it without duplicating the literal.
    #[must_use]
    pub fn fixture_template() -> Value {
        json!({
            "metadata": {"name": "Echo Landing", "route": "/echo"},
            "theme": {"primaryColor": "#3B82F6", "darkMode": false},
            "sections": [
                {"type": "hero", "title": "Echo Page", "subtitle": "Generated by the echo adapter"}
            ],
        })
    }
}

impl Default for EchoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelAdapter for EchoAdapter {
    async fn generate(&self, prompt: &str) -> GenerationResult {
        tracing::debug!(%prompt, "echo adapter invoked");
        match &*self.behavior.lock().unwrap() {
            Behavior::Succeed => {
                let template = Self::fixture_template();
                GenerationResult::success(template.clone(), template.to_string())
            }
            Behavior::RetryableFailure(reason) => GenerationResult::retryable_failure(reason.clone()),
            Behavior::PermanentFailure(reason) => GenerationResult::permanent_failure(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_with_the_fixture_template_by_default() {
        let adapter = EchoAdapter::new();
        let result = adapter.generate("build a landing page").await;
        assert!(result.success);
        assert_eq!(result.template, Some(EchoAdapter::fixture_template()));
    }

    #[tokio::test]
    async fn always_retryable_never_succeeds() {
        let adapter = EchoAdapter::always_retryable("rate limited");
        let result = adapter.generate("anything").await;
        assert!(!result.success);
        assert!(result.retryable);
    }
}
