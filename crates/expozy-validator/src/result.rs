//! Accumulated validator output: `{valid, errors, warnings}`.

use serde::{Deserialize, Serialize};

/// One error or warning, tagged with a JSON-pointer-like path so the
/// caller can point at the offending part of the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The outcome of running [`crate::validate`] over one template.
///
/// `errors` come from layers 1–8 and block acceptance; `warnings` come
/// from layer 9 ("Completeness") and never flip `valid` to `false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationResult {
    #[must_use]
    pub fn accepted(warnings: Vec<Issue>) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings,
        }
    }

    #[must_use]
    pub fn rejected(errors: Vec<Issue>, warnings: Vec<Issue>) -> Self {
        Self {
            valid: false,
            errors,
            warnings,
        }
    }

    /// Flat error message strings, for embedding in an attempt's
    /// error-detail column or a `GenerationResult.error`.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|issue| format!("{}: {}", issue.path, issue.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
