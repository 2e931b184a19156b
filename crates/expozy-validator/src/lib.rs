//! # Expozy Validator
//!
//! Pure-function gate between the generative model and everything
//! downstream of it. `validate` never performs I/O and
//! never mutates its input: it parses the raw model JSON into a typed
//! tree, runs nine ordered layers over that tree, and returns an
//! accumulated `{valid, errors, warnings}` report. Layers 1–8 are
//! errors; layer 9 ("Completeness") is warnings only and never flips
//! `valid` to `false`.

pub mod result;
pub mod rules;
pub mod schema;
pub mod traversal;

pub use result::{Issue, ValidationResult};
pub use schema::TemplatePackage;

use serde_json::Value;

/// Runs every layer, in spec order, over `raw` and returns the
/// accumulated result. All layers run even once earlier ones have
/// produced errors, so a single call surfaces every problem at once
/// instead of stopping at the first.
#[must_use]
pub fn validate(raw: &Value) -> ValidationResult {
    let structural_errors = rules::layer1_structural(raw);
    let package = TemplatePackage::parse(raw);

    let mut errors = structural_errors;
    errors.extend(rules::layer2_endpoint_format(&package));
    errors.extend(rules::layer3_referential_integrity(&package));
    errors.extend(rules::layer4_security_string_content(raw));
    errors.extend(rules::layer5_reactive_directives(raw));
    errors.extend(rules::layer6_style_policy(&package));
    errors.extend(rules::layer7_theme(&package));
    errors.extend(rules::layer8_route(&package));

    let warnings = rules::layer9_completeness(&package);

    if errors.is_empty() {
        ValidationResult::accepted(warnings)
    } else {
        ValidationResult::rejected(errors, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_valid_template_is_accepted() {
        let raw = json!({
            "metadata": {"name": "Landing", "route": "/landing"},
            "sections": [{"type": "hero", "title": "Welcome"}],
        });
        let result = validate(&raw);
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn malicious_title_is_rejected_and_requeueable() {
        let raw = json!({
            "sections": [{"type": "hero", "title": "<script>alert(1)</script>"}],
        });
        let result = validate(&raw);
        assert!(!result.valid);
        assert!(result.error_summary().contains("script"));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let raw = json!({
            "dataSources": [{"id": "products", "endpoint": "get.products"}],
            "sections": [{"type": "list", "dataSource": "reviews"}],
        });
        let result = validate(&raw);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("unknown data source")));
    }

    #[test]
    fn cyclic_children_do_not_hang_validation() {
        let raw = json!({
            "sections": [{"type": "a", "id": "root"}],
        });
        // Build a cycle the parser alone cannot express from JSON (arrays
        // can't reference earlier siblings by index), so this exercises
        // only the acyclic path end-to-end; the traversal module's own
        // tests cover the cyclic arena case directly.
        let result = validate(&raw);
        assert!(result.valid);
    }

    #[test]
    fn re_validating_an_accepted_template_is_idempotent() {
        let raw = json!({
            "theme": {"primaryColor": "#abc123", "darkMode": true},
            "sections": [{"type": "hero", "title": "Welcome"}],
        });
        let first = validate(&raw);
        let second = validate(&raw);
        assert_eq!(first.valid, second.valid);
        assert_eq!(first.errors.len(), second.errors.len());
        assert!(second.valid);
    }
}
