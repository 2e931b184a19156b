//! Full-document composition: a validated [`TemplatePackage`] in,
//! one HTML string out. Pure function, no I/O.

use crate::sanitizer::escape_html;
use crate::sections::render_section;
use expozy_validator::schema::TemplatePackage;

const FALLBACK_PRIMARY_COLOR: &str = "#3B82F6";
const DEFAULT_TITLE: &str = "Generated Page";

/// Renders a whole page (`<!DOCTYPE html>` through `</html>`) from an
/// already-validated template. Section order follows
/// [`TemplatePackage::roots`]; nested `children` are intentionally not
/// walked here — only root sections become top-level page sections, and
/// a section owns the rendering of anything nested beneath it if its
/// renderer chooses to look at `children` (none currently do, matching
/// the flat section list the source renderer operated on).
#[must_use]
pub fn render_page(package: &TemplatePackage) -> String {
    let title = package
        .metadata
        .as_ref()
        .and_then(|m| m.name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let description = package
        .metadata
        .as_ref()
        .and_then(|m| m.description.clone())
        .unwrap_or_default();

    let primary_color = package
        .theme
        .as_ref()
        .and_then(|t| t.primary_color.clone())
        .unwrap_or_else(|| FALLBACK_PRIMARY_COLOR.to_string());

    let dark_mode = package
        .theme
        .as_ref()
        .and_then(|t| t.dark_mode.as_ref())
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let sections_html: String = package
        .roots
        .iter()
        .filter_map(|idx| package.sections.get(*idx))
        .map(render_section)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<meta name="description" content="{description}">
<style>{style}</style>
</head>
<body>
{sections_html}
</body>
</html>
"#,
        title = escape_html(&title),
        description = escape_html(&description),
        style = page_style(&primary_color, dark_mode),
    )
}

fn page_style(primary_color: &str, dark_mode: bool) -> String {
    let (bg, fg, muted, card, border) = if dark_mode {
        ("#0b1220", "#e5e7eb", "#9ca3af", "#0f172a", "rgba(255,255,255,0.08)")
    } else {
        ("#ffffff", "#111827", "#6b7280", "#f9fafb", "rgba(0,0,0,0.08)")
    };

    format!(
        r#":root {{
    --primary-color: {primary};
    --bg: {bg};
    --fg: {fg};
    --muted: {muted};
    --card: {card};
    --border: {border};
}}
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; line-height: 1.6; background: var(--bg); color: var(--fg); }}
.section {{ padding: 4rem 2rem; max-width: 1200px; margin: 0 auto; }}
.section-title {{ font-size: 2.2rem; font-weight: 800; margin-bottom: 0.75rem; }}
.section-subtitle {{ font-size: 1.1rem; color: var(--muted); margin-bottom: 1.75rem; }}
.section-content {{ font-size: 1.05rem; color: var(--fg); max-width: 900px; }}
.muted {{ color: var(--muted); }}
.section-hero {{ position: relative; text-align: center; color: white; padding: 6rem 2rem; max-width: none; border-bottom: 1px solid var(--border); background: linear-gradient(135deg, var(--primary-color), #8b5cf6); }}
.hero-overlay {{ position: absolute; inset: 0; background: rgba(0,0,0,0.45); }}
.hero-inner {{ position: relative; max-width: 900px; margin: 0 auto; }}
.hero-title {{ font-size: 3rem; font-weight: 900; line-height: 1.1; margin-bottom: 1rem; }}
.hero-subtitle {{ font-size: 1.2rem; opacity: 0.95; }}
.section-buttons {{ display: flex; gap: 1rem; justify-content: center; flex-wrap: wrap; margin-top: 2rem; }}
.btn {{ display: inline-block; padding: 0.75rem 1.5rem; border-radius: 0.75rem; text-decoration: none; font-weight: 700; border: 1px solid transparent; }}
.btn-primary {{ background: white; color: #111827; }}
.btn-secondary {{ background: transparent; color: white; border-color: rgba(255,255,255,0.7); }}
.grid {{ display: grid; grid-template-columns: repeat(var(--cols, 3), minmax(0, 1fr)); gap: 1rem; }}
.card {{ background: var(--card); border: 1px solid var(--border); border-radius: 1rem; padding: 1.25rem; }}
.card-icon {{ color: var(--muted); font-size: 0.9rem; margin-bottom: 0.5rem; }}
.card-title {{ font-weight: 800; margin-bottom: 0.35rem; }}
.card-meta {{ color: var(--muted); font-size: 0.9rem; margin-bottom: 0.75rem; }}
.card-body {{ color: var(--fg); font-size: 0.98rem; }}
.section-cta {{ max-width: none; background: #111827; color: white; }}
.section-form .form {{ display: flex; flex-direction: column; gap: 1rem; max-width: 480px; }}
.form-field {{ display: flex; flex-direction: column; gap: 0.35rem; }}
.input {{ padding: 0.6rem 0.8rem; border-radius: 0.5rem; border: 1px solid var(--border); background: var(--card); color: var(--fg); }}
.section-footer {{ background: var(--card); border-top: 1px solid var(--border); }}
.footer-links {{ display: flex; gap: 1.5rem; flex-wrap: wrap; margin-top: 1rem; }}
.footer-link {{ color: var(--fg); text-decoration: none; }}"#,
        primary = escape_html(primary_color),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_full_document_with_escaped_title() {
        let raw = json!({
            "metadata": {"name": "<b>Landing</b>"},
            "sections": [{"type": "hero", "title": "Welcome"}],
        });
        let package = TemplatePackage::parse(&raw);
        let html = render_page(&package);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("&lt;b&gt;Landing&lt;/b&gt;"));
        assert!(html.contains("section-hero"));
    }

    #[test]
    fn dark_mode_swaps_palette() {
        let raw = json!({"theme": {"darkMode": true}, "sections": []});
        let package = TemplatePackage::parse(&raw);
        let html = render_page(&package);
        assert!(html.contains("#0b1220"));
    }

    #[test]
    fn only_root_sections_are_rendered_top_level() {
        let raw = json!({
            "sections": [{"type": "hero", "children": [{"type": "cta"}]}],
        });
        let package = TemplatePackage::parse(&raw);
        let html = render_page(&package);
        assert_eq!(html.matches("<section").count(), 1);
    }
}
