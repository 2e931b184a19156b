//! String-by-string context-aware cleaning.
//!
//! The Validator already rejects a template carrying XSS signatures, so
//! by the time a template reaches here it has already been accepted.
//! These functions are the second line of defense the renderer leans
//! on for every string it interpolates into HTML: escape text nodes,
//! strip class names down to a safe character set, and only ever emit
//! `http`/`https` URLs.

/// HTML-escapes a string for use as element text content or a quoted
/// attribute value.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reduces a class string to `[a-zA-Z0-9_\- ]`, trimmed. Mirrors the
/// Validator's style-policy layer but is defense-in-depth, not a
/// replacement for it: this runs unconditionally on already-accepted
/// input.
#[must_use]
pub fn safe_class(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Allows only absolute `http`/`https` URLs; everything else — relative
/// paths, `javascript:`, `data:`, malformed input — becomes an empty
/// string so the renderer can fall back to `#`.
#[must_use]
pub fn safe_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return String::new();
    }
    trimmed.replace('"', "%22").replace('\'', "%27")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_all_five_entities() {
        assert_eq!(
            escape_html(r#"<a href="x">it's & fine</a>"#),
            "&lt;a href=&quot;x&quot;&gt;it&#x27;s &amp; fine&lt;/a&gt;"
        );
    }

    #[test]
    fn safe_class_strips_disallowed_characters() {
        assert_eq!(safe_class("hero <script> bg-red-500"), "hero script bg-red-500");
    }

    #[test]
    fn safe_url_rejects_non_http_schemes() {
        assert_eq!(safe_url("javascript:alert(1)"), "");
        assert_eq!(safe_url("data:text/html,x"), "");
        assert_eq!(safe_url("/relative/path"), "");
        assert_eq!(safe_url("https://example.com/x"), "https://example.com/x");
    }
}
