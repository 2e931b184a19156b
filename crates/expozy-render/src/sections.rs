//! Per-section-type HTML fragments: hero, features, products/testimonials
//! (shared card-grid shape), cta, form, footer, and a fallback for
//! anything else. Each function takes an
//! already-validated [`expozy_validator::schema::Section`] and returns
//! one HTML fragment; none of them perform I/O.

use crate::sanitizer::{escape_html, safe_class, safe_url};
use expozy_validator::schema::Section;
use serde_json::Value;

const DYNAMIC_PLACEHOLDER_CARDS: usize = 2;

pub fn render_section(section: &Section) -> String {
    match section.section_type.as_str() {
        "hero" => render_hero(section),
        "features" => render_features(section),
        "products" => render_dynamic_grid(section, "products"),
        "testimonials" => render_dynamic_grid(section, "testimonials"),
        "cta" => render_cta(section),
        "form" => render_form(section),
        "footer" => render_footer(section),
        other => render_default(section, other),
    }
}

fn section_class(section: &Section, base: &str) -> String {
    let extra = section
        .class_name
        .as_deref()
        .map(safe_class)
        .unwrap_or_default();
    if extra.is_empty() {
        format!("section {base}")
    } else {
        format!("section {base} {extra}")
    }
}

fn maybe_title(title: &Option<String>) -> String {
    title
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| format!(r#"<h2 class="section-title">{}</h2>"#, escape_html(t)))
        .unwrap_or_default()
}

fn maybe_subtitle(subtitle: &Option<String>) -> String {
    subtitle
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| format!(r#"<p class="section-subtitle">{}</p>"#, escape_html(t)))
        .unwrap_or_default()
}

fn maybe_content(content: &Option<Value>) -> String {
    let Some(text) = content.as_ref().and_then(Value::as_str).filter(|t| !t.is_empty()) else {
        return String::new();
    };
    format!(r#"<div class="section-content">{}</div>"#, escape_html(text))
}

fn render_buttons(section: &Section) -> String {
    let buttons: String = section
        .buttons
        .iter()
        .map(|btn| {
            let variant = btn.variant.as_deref().unwrap_or("primary").to_ascii_lowercase();
            let label = btn.label.as_deref().filter(|l| !l.is_empty()).unwrap_or("Button");
            let href = btn.href.as_deref().unwrap_or("#");
            let safe_href = {
                let cleaned = safe_url(href);
                if cleaned.is_empty() { "#".to_string() } else { cleaned }
            };
            let btn_class = if matches!(variant.as_str(), "outline" | "secondary") {
                "btn-secondary"
            } else {
                "btn-primary"
            };
            format!(
                r#"<a href="{}" class="btn {btn_class}">{}</a>"#,
                escape_html(&safe_href),
                escape_html(label)
            )
        })
        .collect();
    format!(r#"<div class="section-buttons">{buttons}</div>"#)
}

fn render_hero(section: &Section) -> String {
    format!(
        r#"<section class="{class} section-hero">
    <div class="hero-overlay"></div>
    <div class="hero-inner">
        {title}
        {subtitle}
        {buttons}
    </div>
</section>"#,
        class = section_class(section, "section-hero"),
        title = maybe_title(&section.title).replace("section-title", "hero-title"),
        subtitle = maybe_subtitle(&section.subtitle).replace("section-subtitle", "hero-subtitle"),
        buttons = render_buttons(section),
    )
}

fn render_features(section: &Section) -> String {
    let cols = section.columns.unwrap_or(3).clamp(1, 4);
    let items = section.items.as_ref().and_then(Value::as_array).cloned().unwrap_or_default();

    let cards: String = if items.is_empty() {
        r#"<div class="muted">No feature items provided.</div>"#.to_string()
    } else {
        items
            .iter()
            .map(|item| {
                let title = item_str(item, &["title"]);
                let content = item_str(item, &["content"]);
                let icon = item_str(item, &["icon"]);
                format!(
                    r#"<div class="card">
    {icon_html}
    {title_html}
    {body_html}
</div>"#,
                    icon_html = opt_div("card-icon", &icon),
                    title_html = opt_div("card-title", &title),
                    body_html = opt_div("card-body", &content),
                )
            })
            .collect()
    };

    format!(
        r#"<section class="{class}">
    {title}
    {subtitle}
    <div class="grid" style="--cols:{cols};">{cards}</div>
</section>"#,
        class = section_class(section, "section-features"),
        title = maybe_title(&section.title),
        subtitle = maybe_subtitle(&section.subtitle),
    )
}

fn render_dynamic_grid(section: &Section, kind: &str) -> String {
    let cols = section.columns.unwrap_or(3).clamp(1, 4);
    let items = section.items.as_ref().and_then(Value::as_array).cloned();

    let cards = match items {
        Some(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                let title = item_str(item, &["title", "name"]);
                let subtitle = item_str(item, &["subtitle", "role", "price"]);
                let content = item_str(item, &["content", "text", "description"]);
                format!(
                    r#"<div class="card">
    {title_html}
    {meta_html}
    {body_html}
</div>"#,
                    title_html = opt_div("card-title", &title),
                    meta_html = opt_div("card-meta", &subtitle),
                    body_html = opt_div("card-body", &content),
                )
            })
            .collect(),
        _ => {
            let label = match &section.data_source {
                Some(ds) => format!("Loaded from dataSource: {ds}"),
                None => "No items/dataSource provided".to_string(),
            };
            (0..(cols as usize * DYNAMIC_PLACEHOLDER_CARDS))
                .map(|i| {
                    format!(
                        r#"<div class="card">
    <div class="card-title">{} Item {}</div>
    <div class="card-body muted">{}</div>
</div>"#,
                        escape_html(&title_case(kind)),
                        i + 1,
                        escape_html(&label)
                    )
                })
                .collect()
        }
    };

    format!(
        r#"<section class="{class}">
    {title}
    {subtitle}
    <div class="grid" style="--cols:{cols};">{cards}</div>
</section>"#,
        class = section_class(section, &format!("section-{kind}")),
        title = maybe_title(&section.title),
        subtitle = maybe_subtitle(&section.subtitle),
    )
}

fn render_cta(section: &Section) -> String {
    format!(
        r#"<section class="{class}">
    <div class="cta-inner">
        {title}
        {content}
        {buttons}
    </div>
</section>"#,
        class = section_class(section, "section-cta"),
        title = maybe_title(&section.title),
        content = maybe_content(&section.content),
        buttons = render_buttons(section),
    )
}

fn render_form(section: &Section) -> String {
    let fields: String = section
        .fields
        .iter()
        .map(|field| {
            let name = field.name.as_deref().unwrap_or("field");
            let label = field.label.as_deref().unwrap_or(name);
            let field_type = field.field_type.as_deref().unwrap_or("text");
            let placeholder = field.placeholder.as_deref().unwrap_or("");
            let required = if field.required.unwrap_or(false) { "required" } else { "" };
            format!(
                r#"<label class="form-field">
    <span class="form-label">{}</span>
    <input class="input" name="{}" type="{}" placeholder="{}" {}/>
</label>"#,
                escape_html(label),
                escape_html(name),
                escape_html(field_type),
                escape_html(placeholder),
                required
            )
        })
        .collect();

    format!(
        r#"<section class="{class}">
    {title}
    {subtitle}
    <form class="form" action="#" method="post">
        {fields}
        <button type="submit" class="btn btn-primary">Submit</button>
    </form>
    <div class="muted form-note">Note: form submit is disabled in preview (no backend).</div>
</section>"#,
        class = section_class(section, "section-form"),
        title = maybe_title(&section.title),
        subtitle = maybe_subtitle(&section.subtitle),
    )
}

fn render_footer(section: &Section) -> String {
    let items = section.items.as_ref().and_then(Value::as_array).cloned().unwrap_or_default();
    let links: String = items
        .iter()
        .filter_map(|item| {
            let title = item_str(item, &["title"])?;
            let href = item_str(item, &["href"]).unwrap_or_else(|| "#".to_string());
            let safe_href = {
                let cleaned = safe_url(&href);
                if cleaned.is_empty() { "#".to_string() } else { cleaned }
            };
            Some(format!(
                r#"<a class="footer-link" href="{}">{}</a>"#,
                escape_html(&safe_href),
                escape_html(&title)
            ))
        })
        .collect();

    format!(
        r#"<footer class="{class}">
    <div class="footer-inner">
        {content}
        <div class="footer-links">{links}</div>
    </div>
</footer>"#,
        class = section_class(section, "section-footer"),
        content = maybe_content(&section.content),
    )
}

fn render_default(section: &Section, section_type: &str) -> String {
    format!(
        r#"<section class="{class}">
    {title}
    {subtitle}
    {content}
    {buttons}
</section>"#,
        class = section_class(section, &format!("section-{}", escape_html(section_type))),
        title = maybe_title(&section.title),
        subtitle = maybe_subtitle(&section.subtitle),
        content = maybe_content(&section.content),
        buttons = render_buttons(section),
    )
}

fn opt_div(class: &str, value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| format!(r#"<div class="{class}">{}</div>"#, escape_html(v)))
        .unwrap_or_default()
}

fn item_str(item: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = item.get(*key).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expozy_validator::schema::Section;
    use serde_json::Map;

    fn blank(section_type: &str) -> Section {
        Section {
            section_type: section_type.to_string(),
            id: None,
            title: None,
            subtitle: None,
            content: None,
            class_name: None,
            data_source: None,
            action_ref: None,
            buttons: Vec::new(),
            items: None,
            fields: Vec::new(),
            columns: None,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    #[test]
    fn hero_escapes_title_and_subtitle() {
        let mut section = blank("hero");
        section.title = Some("<b>Welcome</b>".to_string());
        let html = render_hero(&section);
        assert!(html.contains("&lt;b&gt;Welcome&lt;/b&gt;"));
        assert!(!html.contains("<b>Welcome</b>"));
    }

    #[test]
    fn products_without_items_emits_placeholder_cards() {
        let mut section = blank("products");
        section.data_source = Some("catalog".to_string());
        section.columns = Some(2);
        let html = render_dynamic_grid(&section, "products");
        assert!(html.contains("Loaded from dataSource: catalog"));
        assert_eq!(html.matches("class=\"card\"").count(), 4);
    }

    #[test]
    fn button_href_falls_back_to_hash_when_unsafe() {
        let mut section = blank("cta");
        section.buttons = vec![expozy_validator::schema::Button {
            label: Some("Go".to_string()),
            variant: None,
            href: Some("javascript:alert(1)".to_string()),
            action_ref: None,
            extra: Map::new(),
        }];
        let html = render_buttons(&section);
        assert!(html.contains(r#"href="#""#));
    }

    #[test]
    fn form_renders_one_input_per_field() {
        let mut section = blank("form");
        section.fields = vec![expozy_validator::schema::Field {
            name: Some("email".to_string()),
            label: Some("Email".to_string()),
            field_type: Some("email".to_string()),
            placeholder: None,
            required: Some(true),
            extra: Map::new(),
        }];
        let html = render_form(&section);
        assert!(html.contains(r#"name="email""#));
        assert!(html.contains("required"));
    }

    #[test]
    fn unknown_section_type_uses_default_renderer() {
        let section = blank("pricing-table");
        let html = render_section(&section);
        assert!(html.contains("section-pricing-table"));
    }
}
