//! HTTP-backed [`ModelAdapter`]: build a `reqwest::Client` once and reuse
//! it for every call, the same way the rest of this workspace's outbound
//! HTTP clients are built.

use crate::result::GenerationResult;
use crate::traits::ModelAdapter;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Calls a configured HTTP endpoint that wraps the actual generative
/// model. The wire contract is deliberately thin: POST `{prompt, model}`,
/// expect the page-template JSON object back verbatim in the response
/// body.
pub struct HttpModelAdapter {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    model: &'a str,
}

impl HttpModelAdapter {
    /// `timeout` is the per-call deadline from configuration (`ai_timeout`).
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(16)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ModelAdapter for HttpModelAdapter {
    async fn generate(&self, prompt: &str) -> GenerationResult {
        debug!(endpoint = %self.endpoint, "invoking model adapter");

        let response = match self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                prompt,
                model: &self.model,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return GenerationResult::retryable_failure(format!("model call timed out: {err}"));
            }
            Err(err) => {
                return GenerationResult::retryable_failure(format!("model call failed: {err}"));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return classify_http_failure(status, &body);
        }

        match serde_json::from_str(&body) {
            Ok(template) => GenerationResult::success(template, body),
            Err(err) => GenerationResult::retryable_failure(format!(
                "model response was not valid JSON: {err}"
            )),
        }
    }
}

fn classify_http_failure(status: StatusCode, body: &str) -> GenerationResult {
    let message = format!("model endpoint returned {status}: {body}");
    let result = if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        GenerationResult::retryable_failure(message)
    } else if status == StatusCode::UNAUTHORIZED {
        // token-expiry is treated as retryable rather than a permanent rejection
        GenerationResult::retryable_failure(message)
    } else {
        GenerationResult::permanent_failure(message)
    };
    result.with_status_code(status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let result = classify_http_failure(StatusCode::SERVICE_UNAVAILABLE, "down");
        assert!(result.retryable);
        assert!(!result.success);
    }

    #[test]
    fn bad_request_is_permanent() {
        let result = classify_http_failure(StatusCode::BAD_REQUEST, "bad prompt");
        assert!(!result.retryable);
        assert!(!result.success);
    }

    #[test]
    fn unauthorized_is_retryable_token_expiry() {
        let result = classify_http_failure(StatusCode::UNAUTHORIZED, "expired");
        assert!(result.retryable);
    }
}
