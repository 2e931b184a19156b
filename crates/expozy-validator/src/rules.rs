//! The nine ordered validation layers.
//!
//! Layers 1–8 append to `errors`; layer 9 appends to `warnings` only.
//! Every layer runs regardless of what earlier layers found ("later
//! layers run even if earlier produced errors") — each `layerN` function
//! below is a pure `&TemplatePackage -> Vec<Issue>` and the caller
//! concatenates them in order.

use crate::result::Issue;
use crate::schema::{Section, TemplatePackage};
use crate::traversal::walk;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

static API_ENDPOINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(get|post|put|patch|delete)\.[a-z][a-z0-9_]*$").unwrap());
static MODULE_ENDPOINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9_]*\.[a-z][a-z0-9_]*$").unwrap());
static DANGEROUS_ENDPOINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(drop|truncate|delete\.users|delete\.all|admin|exec|eval|system)").unwrap()
});

static ON_EVENT_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bon\w+\s*=").unwrap());
static XSS_SIGNATURES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("<script", Regex::new(r"(?i)<script").unwrap()),
        ("javascript:", Regex::new(r"(?i)javascript:").unwrap()),
        ("<iframe", Regex::new(r"(?i)<iframe").unwrap()),
        ("<object", Regex::new(r"(?i)<object").unwrap()),
        ("<embed", Regex::new(r"(?i)<embed").unwrap()),
        (
            "<meta http-equiv",
            Regex::new(r"(?i)<meta\s+http-equiv").unwrap(),
        ),
        ("<base", Regex::new(r"(?i)<base").unwrap()),
        ("expression(", Regex::new(r"(?i)expression\(").unwrap()),
        ("url(data:", Regex::new(r"(?i)url\(\s*data:").unwrap()),
        ("@import", Regex::new(r"(?i)@import").unwrap()),
    ]
});

static REACTIVE_DIRECTIVE_SIGNATURES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("x-html directive", Regex::new(r"(?i)x-html\s*=").unwrap()),
        (
            "event-binding function call",
            Regex::new(r"(?i)@(click|change|input|submit|load)\s*=\s*\"[^\"]*\([^)]*\)").unwrap(),
        ),
        (
            "init directive invoking eval/fetch",
            Regex::new(r#"(?i)x-init\s*=\s*"[^"]*(eval|fetch)\s*\("#).unwrap(),
        ),
    ]
});

static CSS_URL_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)url\(").unwrap());
static PRIMARY_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap());
static ROUTE_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/[a-zA-Z0-9_\-/{}]*$").unwrap());

const DYNAMIC_CONTENT_TYPES: [&str; 2] = ["products", "posts"];
const CLASS_NAME_MAX_LEN: usize = 500;

/// Layer 1: top-level shape. The parser is lenient by design, so this
/// layer only flags the case the parser cannot repair: a non-object
/// template root.
pub fn layer1_structural(raw: &Value) -> Vec<Issue> {
    if raw.as_object().is_none() {
        return vec![Issue::new("$", "template must be a JSON object")];
    }
    Vec::new()
}

/// Layer 2: `endpoint` format + dangerous-substring rejection, over
/// every `dataSources[*].endpoint` and `actions[*].endpoint`.
pub fn layer2_endpoint_format(package: &TemplatePackage) -> Vec<Issue> {
    let mut errors = Vec::new();

    for (idx, ds) in package.data_sources.iter().enumerate() {
        check_endpoint(&format!("dataSources[{idx}].endpoint"), &ds.endpoint, &mut errors);
    }
    for (idx, action) in package.actions.iter().enumerate() {
        check_endpoint(&format!("actions[{idx}].endpoint"), &action.endpoint, &mut errors);
    }

    errors
}

fn check_endpoint(path: &str, endpoint: &str, errors: &mut Vec<Issue>) {
    if !API_ENDPOINT.is_match(endpoint) && !MODULE_ENDPOINT.is_match(endpoint) {
        errors.push(Issue::new(
            path,
            format!("endpoint \"{endpoint}\" does not match the API or Module form"),
        ));
    }
    if DANGEROUS_ENDPOINT.is_match(endpoint) {
        errors.push(Issue::new(
            path,
            format!("endpoint \"{endpoint}\" names a dangerous operation"),
        ));
    }
}

/// Layer 3: referential integrity between sections/buttons and the
/// `dataSources`/`actions` id tables, plus duplicate-id rejection.
pub fn layer3_referential_integrity(package: &TemplatePackage) -> Vec<Issue> {
    let mut errors = Vec::new();

    let data_source_ids = collect_unique_ids(
        package.data_sources.iter().map(|ds| ds.id.as_str()),
        "dataSources",
        &mut errors,
    );
    let action_ids = collect_unique_ids(
        package.actions.iter().map(|a| a.id.as_str()),
        "actions",
        &mut errors,
    );

    let component_ids: Vec<&str> = package
        .sections
        .iter()
        .filter_map(|s| s.id.as_deref())
        .collect();
    collect_unique_ids(component_ids.into_iter(), "component ids", &mut errors);

    let revisited = walk(package, |visited| {
        let section = visited.section;
        if let Some(ds_ref) = &section.data_source {
            if !data_source_ids.contains(ds_ref.as_str()) {
                errors.push(Issue::new(
                    format!("{}.dataSource", visited.path),
                    format!("references unknown data source \"{ds_ref}\""),
                ));
            }
        }
        if let Some(action_ref) = &section.action_ref {
            if !action_ids.contains(action_ref.as_str()) {
                errors.push(Issue::new(
                    format!("{}.actionRef", visited.path),
                    format!("references unknown action \"{action_ref}\""),
                ));
            }
        }
        for (btn_idx, button) in section.buttons.iter().enumerate() {
            if let Some(action_ref) = &button.action_ref {
                if !action_ids.contains(action_ref.as_str()) {
                    errors.push(Issue::new(
                        format!("{}.buttons[{btn_idx}].actionRef", visited.path),
                        format!("references unknown action \"{action_ref}\""),
                    ));
                }
            }
        }
    });

    for index in revisited {
        errors.push(Issue::new(
            format!("sections[{index}]"),
            "section graph contains a cycle or a section shared by more than one parent",
        ));
    }

    errors
}

fn collect_unique_ids<'a>(
    ids: impl Iterator<Item = &'a str>,
    label: &str,
    errors: &mut Vec<Issue>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(Issue::new(
                "$",
                format!("duplicate id \"{id}\" within {label}"),
            ));
        }
    }
    seen
}

/// Layers 4 and 5 share a traversal: every string value reachable from
/// the template, scanned against two fixed signature lists. Kept as one
/// function pair so a single walk produces both error sets in document
/// order.
pub fn layer4_security_string_content(raw: &Value) -> Vec<Issue> {
    let mut errors = Vec::new();
    for occurrence in walk_strings(raw, "$".to_string()) {
        if ON_EVENT_ATTR.is_match(occurrence.value) {
            errors.push(Issue::new(
                occurrence.path.clone(),
                "contains an on-event attribute".to_string(),
            ));
        }
        for (label, pattern) in XSS_SIGNATURES.iter() {
            if pattern.is_match(occurrence.value) {
                errors.push(Issue::new(
                    occurrence.path.clone(),
                    format!("contains disallowed content: {label}"),
                ));
            }
        }
    }
    errors
}

pub fn layer5_reactive_directives(raw: &Value) -> Vec<Issue> {
    let mut errors = Vec::new();
    for occurrence in walk_strings(raw, "$".to_string()) {
        for (label, pattern) in REACTIVE_DIRECTIVE_SIGNATURES.iter() {
            if pattern.is_match(occurrence.value) {
                errors.push(Issue::new(
                    occurrence.path.clone(),
                    format!("contains disallowed reactive directive: {label}"),
                ));
            }
        }
    }
    errors
}

struct StringOccurrence {
    path: String,
    value: String,
}

fn walk_strings(value: &Value, path: String) -> Vec<StringOccurrence> {
    let mut out = Vec::new();
    collect_strings(value, &path, &mut out);
    out
}

fn collect_strings(value: &Value, path: &str, out: &mut Vec<StringOccurrence>) {
    match value {
        Value::String(s) => out.push(StringOccurrence {
            path: path.to_string(),
            value: s.clone(),
        }),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                collect_strings(item, &format!("{path}[{idx}]"), out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_strings(item, &format!("{path}.{key}"), out);
            }
        }
        _ => {}
    }
}

/// Layer 6: class-string length bound + disallowed arbitrary-value
/// tokens, over every section's `className`.
pub fn layer6_style_policy(package: &TemplatePackage) -> Vec<Issue> {
    let mut errors = Vec::new();

    walk(package, |visited| {
        let Some(class_name) = &visited.section.class_name else {
            return;
        };
        let path = format!("{}.className", visited.path);

        if class_name.chars().count() > CLASS_NAME_MAX_LEN {
            errors.push(Issue::new(
                path.clone(),
                format!(
                    "className exceeds {CLASS_NAME_MAX_LEN} characters ({} found)",
                    class_name.chars().count()
                ),
            ));
        }

        if class_name.contains("javascript:") || CSS_URL_TOKEN.is_match(class_name) {
            errors.push(Issue::new(
                path.clone(),
                "className contains a disallowed arbitrary-value token".to_string(),
            ));
        } else if class_name.contains('<') && class_name.contains('>') {
            errors.push(Issue::new(
                path,
                "className carries an HTML fragment in an arbitrary-value token".to_string(),
            ));
        }
    });

    errors
}

/// Layer 7: `theme.primaryColor` hex shape, `theme.darkMode` boolean-ness.
pub fn layer7_theme(package: &TemplatePackage) -> Vec<Issue> {
    let Some(theme) = &package.theme else {
        return Vec::new();
    };
    let mut errors = Vec::new();

    if let Some(color) = &theme.primary_color {
        if !PRIMARY_COLOR.is_match(color) {
            errors.push(Issue::new(
                "theme.primaryColor",
                format!("\"{color}\" is not a 3/6/8-digit hex color"),
            ));
        }
    }

    if let Some(dark_mode) = &theme.dark_mode {
        if !dark_mode.is_boolean() {
            errors.push(Issue::new("theme.darkMode", "must be a boolean"));
        }
    }

    errors
}

/// Layer 8: `metadata.route` shape and traversal/injection rejection.
pub fn layer8_route(package: &TemplatePackage) -> Vec<Issue> {
    let Some(route) = package.metadata.as_ref().and_then(|m| m.route.as_deref()) else {
        return Vec::new();
    };
    let mut errors = Vec::new();

    if !route.starts_with('/') {
        errors.push(Issue::new("metadata.route", "must start with \"/\""));
    }
    if !ROUTE_SHAPE.is_match(route) {
        errors.push(Issue::new(
            "metadata.route",
            "contains characters outside [a-zA-Z0-9_-/{}]",
        ));
    }
    if route.contains("..") {
        errors.push(Issue::new("metadata.route", "contains a path traversal segment \"..\""));
    }
    if route.contains('<') || route.contains('>') || route.contains('"') || route.contains('\'') {
        errors.push(Issue::new("metadata.route", "contains angle brackets or quotes"));
    }
    if route.to_ascii_lowercase().contains("javascript:") {
        errors.push(Issue::new("metadata.route", "contains a javascript: scheme"));
    }

    errors
}

/// Layer 9: completeness warnings. Never blocks acceptance.
pub fn layer9_completeness(package: &TemplatePackage) -> Vec<Issue> {
    let mut warnings = Vec::new();

    if package.roots.is_empty() {
        warnings.push(Issue::new("sections", "template has no sections"));
    }

    walk(package, |visited| {
        let section = visited.section;
        check_form_section(section, &visited.path, &mut warnings);
        check_dynamic_content_section(section, &visited.path, &mut warnings);
    });

    if let Some(metadata) = &package.metadata {
        check_page_type_recommendations(metadata, &mut warnings);
    }

    warnings
}

fn check_form_section(section: &Section, path: &str, warnings: &mut Vec<Issue>) {
    if section.section_type != "form" {
        return;
    }
    if section.fields.is_empty() {
        warnings.push(Issue::new(path, "form section has no fields"));
    }
    if section.action_ref.is_none() {
        warnings.push(Issue::new(path, "form section has no actionRef"));
    }
}

fn check_dynamic_content_section(section: &Section, path: &str, warnings: &mut Vec<Issue>) {
    if !DYNAMIC_CONTENT_TYPES.contains(&section.section_type.as_str()) {
        return;
    }
    if section.data_source.is_none() {
        warnings.push(Issue::new(
            path,
            format!(
                "{} section has no dataSource",
                section.section_type
            ),
        ));
    }
}

fn check_page_type_recommendations(
    metadata: &crate::schema::Metadata,
    warnings: &mut Vec<Issue>,
) {
    let Some(page_type) = &metadata.page_type else {
        return;
    };
    let recommended: &[&str] = match page_type.as_str() {
        "landing" => &["description"],
        "product" => &["description"],
        _ => &[],
    };
    for field in recommended {
        let present = match *field {
            "description" => metadata.description.is_some(),
            _ => true,
        };
        if !present {
            warnings.push(Issue::new(
                "metadata",
                format!("pageType \"{page_type}\" usually sets {field}"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dangerous_endpoint_is_rejected_regardless_of_format() {
        let raw = json!({"dataSources": [{"id": "a", "endpoint": "DROP.TABLES"}]});
        let package = TemplatePackage::parse(&raw);
        let errors = layer2_endpoint_format(&package);
        assert!(errors.iter().any(|e| e.message.contains("dangerous")));
    }

    #[test]
    fn well_formed_api_endpoint_is_accepted() {
        let raw = json!({"actions": [{"id": "a", "endpoint": "post.submit_form"}]});
        let package = TemplatePackage::parse(&raw);
        assert!(layer2_endpoint_format(&package).is_empty());
    }

    #[test]
    fn class_name_at_500_is_accepted_501_is_rejected() {
        let at_limit = "a".repeat(500);
        let over_limit = "a".repeat(501);

        let raw_ok = json!({"sections": [{"type": "hero", "className": at_limit}]});
        let raw_bad = json!({"sections": [{"type": "hero", "className": over_limit}]});

        assert!(layer6_style_policy(&TemplatePackage::parse(&raw_ok)).is_empty());
        assert!(!layer6_style_policy(&TemplatePackage::parse(&raw_bad)).is_empty());
    }

    #[test]
    fn primary_color_hex_lengths() {
        for ok in ["#fff", "#ffffff", "#ffffffff"] {
            let raw = json!({"theme": {"primaryColor": ok}});
            assert!(
                layer7_theme(&TemplatePackage::parse(&raw)).is_empty(),
                "{ok} should be accepted"
            );
        }
        let raw = json!({"theme": {"primaryColor": "#ffff"}});
        assert!(!layer7_theme(&TemplatePackage::parse(&raw)).is_empty());
    }

    #[test]
    fn route_traversal_is_rejected() {
        let raw = json!({"metadata": {"route": "/../admin"}});
        let errors = layer8_route(&TemplatePackage::parse(&raw));
        assert!(errors.iter().any(|e| e.message.contains("traversal")));
    }

    #[test]
    fn empty_sections_is_a_warning_not_an_error() {
        let raw = json!({});
        let package = TemplatePackage::parse(&raw);
        assert!(layer9_completeness(&package)
            .iter()
            .any(|w| w.message.contains("no sections")));
    }

    #[test]
    fn script_tag_in_title_is_flagged() {
        let raw = json!({"sections": [{"type": "hero", "title": "<script>alert(1)</script>"}]});
        let errors = layer4_security_string_content(&raw);
        assert!(errors.iter().any(|e| e.message.contains("script")));
    }
}
