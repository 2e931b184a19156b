//! `GenerationResult` — the one record the Worker ever looks at. The
//! Worker treats adapters as black boxes; the only observable contract
//! is this record plus a per-call timeout.

use expozy_validator::ValidationResult;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub success: bool,
    pub template: Option<Value>,
    pub raw_response: Option<String>,
    pub error: Option<String>,
    pub retryable: bool,
    pub validation: Option<ValidationResult>,
    /// The provider's HTTP status code, when the failure came from an
    /// HTTP call. `None` for transport-level failures (timeout, DNS) or
    /// for the mock adapter.
    pub status_code: Option<i32>,
}

impl GenerationResult {
    #[must_use]
    pub fn success(template: Value, raw_response: impl Into<String>) -> Self {
        Self {
            success: true,
            template: Some(template),
            raw_response: Some(raw_response.into()),
            error: None,
            retryable: false,
            validation: None,
            status_code: None,
        }
    }

    #[must_use]
    pub fn retryable_failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            template: None,
            raw_response: None,
            error: Some(error.into()),
            retryable: true,
            validation: None,
            status_code: None,
        }
    }

    #[must_use]
    pub fn permanent_failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            template: None,
            raw_response: None,
            error: Some(error.into()),
            retryable: false,
            validation: None,
            status_code: None,
        }
    }

    #[must_use]
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(i32::from(status_code));
        self
    }
}
