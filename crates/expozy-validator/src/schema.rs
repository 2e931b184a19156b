//! Typed tree the raw model-output JSON is parsed into.
//!
//! The input is arbitrary untyped JSON. Here, known keys
//! parse into typed fields; everything else is preserved verbatim in an
//! `extra` bag so forward compatibility ("unrecognized keys are ignored")
//! survives the typed round-trip instead of being silently dropped.
//!
//! Sections may nest via a `children` array, and that graph can contain
//! cycles. Rather than a `Box<Section>` tree, sections
//! live in a flat arena (`TemplatePackage::sections`) and `children` is a
//! list of arena indices, which makes cycle detection a `HashSet<usize>`
//! instead of unbounded recursion.

use serde_json::{Map, Value};

/// A parsed (but not yet validated) template package.
#[derive(Debug, Clone, Default)]
pub struct TemplatePackage {
    pub metadata: Option<Metadata>,
    pub theme: Option<Theme>,
    pub data_sources: Vec<DataSource>,
    pub actions: Vec<Action>,
    /// Flat arena of all sections, including nested ones. `roots` lists
    /// the indices that appeared at the top-level `sections` array;
    /// everything else is reachable only via some section's `children`.
    pub sections: Vec<Section>,
    pub roots: Vec<usize>,
    /// Unrecognized top-level keys, preserved opaquely.
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub page_type: Option<String>,
    pub route: Option<String>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub primary_color: Option<String>,
    pub dark_mode: Option<Value>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct DataSource {
    pub id: String,
    pub endpoint: String,
    pub params: Option<Value>,
    pub key_name: Option<String>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Action {
    pub id: String,
    pub endpoint: String,
    pub method: Option<String>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Button {
    pub label: Option<String>,
    pub variant: Option<String>,
    pub href: Option<String>,
    pub action_ref: Option<String>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Option<String>,
    pub label: Option<String>,
    pub field_type: Option<String>,
    pub placeholder: Option<String>,
    pub required: Option<bool>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub section_type: String,
    pub id: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<Value>,
    pub class_name: Option<String>,
    pub data_source: Option<String>,
    pub action_ref: Option<String>,
    pub buttons: Vec<Button>,
    pub items: Option<Value>,
    pub fields: Vec<Field>,
    pub columns: Option<i64>,
    pub children: Vec<usize>,
    pub extra: Map<String, Value>,
}

/// Every string value reachable from a section, tagged with a
/// JSON-pointer-like path, used by the security/style/theme/route layers.
pub struct StringOccurrence<'a> {
    pub path: String,
    pub value: &'a str,
}

impl TemplatePackage {
    /// Parses a raw JSON object into a typed tree. Never fails: malformed
    /// or missing fields are simply absent, and structural correctness is
    /// the job of the "Structural" validator layer, not the parser.
    #[must_use]
    pub fn parse(raw: &Value) -> Self {
        let mut package = TemplatePackage::default();
        let Some(obj) = raw.as_object() else {
            return package;
        };

        for (key, value) in obj {
            match key.as_str() {
                "metadata" => package.metadata = Some(Metadata::parse(value)),
                "theme" => package.theme = Some(Theme::parse(value)),
                "dataSources" => {
                    package.data_sources = value
                        .as_array()
                        .map(|arr| arr.iter().filter_map(DataSource::parse).collect())
                        .unwrap_or_default();
                }
                "actions" => {
                    package.actions = value
                        .as_array()
                        .map(|arr| arr.iter().filter_map(Action::parse).collect())
                        .unwrap_or_default();
                }
                "sections" => {
                    if let Some(arr) = value.as_array() {
                        for section_value in arr {
                            let idx = package.insert_section(section_value);
                            package.roots.push(idx);
                        }
                    }
                }
                _ => {
                    package.extra.insert(key.clone(), value.clone());
                }
            }
        }

        package
    }

    /// Recursively inserts a section (and its `children`) into the arena,
    /// returning the index assigned to this section.
    fn insert_section(&mut self, value: &Value) -> usize {
        let obj = value.as_object().cloned().unwrap_or_default();
        let section_type = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let buttons = obj
            .get("buttons")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Button::parse).collect())
            .unwrap_or_default();

        let fields = obj
            .get("fields")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Field::parse).collect())
            .unwrap_or_default();

        let child_values: Vec<Value> = obj
            .get("children")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut known = vec![
            "type", "id", "title", "subtitle", "content", "className", "dataSource", "actionRef",
            "buttons", "items", "fields", "columns", "children",
        ];
        known.sort_unstable();

        let extra: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| known.binary_search(&k.as_str()).is_err())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let section = Section {
            section_type,
            id: obj.get("id").and_then(Value::as_str).map(str::to_string),
            title: obj.get("title").and_then(Value::as_str).map(str::to_string),
            subtitle: obj
                .get("subtitle")
                .and_then(Value::as_str)
                .map(str::to_string),
            content: obj.get("content").cloned(),
            class_name: obj
                .get("className")
                .and_then(Value::as_str)
                .map(str::to_string),
            data_source: obj
                .get("dataSource")
                .and_then(Value::as_str)
                .map(str::to_string),
            action_ref: obj
                .get("actionRef")
                .and_then(Value::as_str)
                .map(str::to_string),
            buttons,
            items: obj.get("items").cloned(),
            fields,
            columns: obj.get("columns").and_then(Value::as_i64),
            children: Vec::new(),
            extra,
        };

        let idx = self.sections.len();
        self.sections.push(section);

        let child_indices: Vec<usize> = child_values
            .iter()
            .map(|child| self.insert_section(child))
            .collect();
        self.sections[idx].children = child_indices;

        idx
    }
}

impl Metadata {
    fn parse(value: &Value) -> Self {
        let obj = value.as_object().cloned().unwrap_or_default();
        let known = ["name", "description", "pageType", "route"];
        Self {
            name: obj.get("name").and_then(Value::as_str).map(str::to_string),
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            page_type: obj
                .get("pageType")
                .and_then(Value::as_str)
                .map(str::to_string),
            route: obj.get("route").and_then(Value::as_str).map(str::to_string),
            extra: obj
                .into_iter()
                .filter(|(k, _)| !known.contains(&k.as_str()))
                .collect(),
        }
    }
}

impl Theme {
    fn parse(value: &Value) -> Self {
        let obj = value.as_object().cloned().unwrap_or_default();
        let known = ["primaryColor", "darkMode"];
        Self {
            primary_color: obj
                .get("primaryColor")
                .and_then(Value::as_str)
                .map(str::to_string),
            dark_mode: obj.get("darkMode").cloned(),
            extra: obj
                .into_iter()
                .filter(|(k, _)| !known.contains(&k.as_str()))
                .collect(),
        }
    }
}

impl DataSource {
    fn parse(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj.get("id").and_then(Value::as_str)?.to_string();
        let endpoint = obj.get("endpoint").and_then(Value::as_str)?.to_string();
        let known = ["id", "endpoint", "params", "keyName"];
        Some(Self {
            id,
            endpoint,
            params: obj.get("params").cloned(),
            key_name: obj
                .get("keyName")
                .and_then(Value::as_str)
                .map(str::to_string),
            extra: obj
                .iter()
                .filter(|(k, _)| !known.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

impl Action {
    fn parse(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj.get("id").and_then(Value::as_str)?.to_string();
        let endpoint = obj.get("endpoint").and_then(Value::as_str)?.to_string();
        let known = ["id", "endpoint", "method"];
        Some(Self {
            id,
            endpoint,
            method: obj.get("method").and_then(Value::as_str).map(str::to_string),
            extra: obj
                .iter()
                .filter(|(k, _)| !known.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

impl Button {
    fn parse(value: &Value) -> Option<Self> {
        let obj = value.as_object()?.clone();
        let known = ["label", "variant", "href", "actionRef"];
        Some(Self {
            label: obj.get("label").and_then(Value::as_str).map(str::to_string),
            variant: obj
                .get("variant")
                .and_then(Value::as_str)
                .map(str::to_string),
            href: obj.get("href").and_then(Value::as_str).map(str::to_string),
            action_ref: obj
                .get("actionRef")
                .and_then(Value::as_str)
                .map(str::to_string),
            extra: obj
                .into_iter()
                .filter(|(k, _)| !known.contains(&k.as_str()))
                .collect(),
        })
    }
}

impl Field {
    fn parse(value: &Value) -> Option<Self> {
        let obj = value.as_object()?.clone();
        let known = ["name", "label", "type", "placeholder", "required"];
        Some(Self {
            name: obj.get("name").and_then(Value::as_str).map(str::to_string),
            label: obj.get("label").and_then(Value::as_str).map(str::to_string),
            field_type: obj.get("type").and_then(Value::as_str).map(str::to_string),
            placeholder: obj
                .get("placeholder")
                .and_then(Value::as_str)
                .map(str::to_string),
            required: obj.get("required").and_then(Value::as_bool),
            extra: obj
                .into_iter()
                .filter(|(k, _)| !known.contains(&k.as_str()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unrecognized_top_level_keys_are_preserved() {
        let raw = json!({
            "metadata": {"name": "Landing"},
            "futureFeature": {"flag": true},
        });
        let package = TemplatePackage::parse(&raw);
        assert_eq!(
            package.extra.get("futureFeature"),
            Some(&json!({"flag": true}))
        );
    }

    #[test]
    fn nested_children_are_flattened_into_arena() {
        let raw = json!({
            "sections": [
                {"type": "hero", "children": [{"type": "button"}]}
            ]
        });
        let package = TemplatePackage::parse(&raw);
        assert_eq!(package.sections.len(), 2);
        assert_eq!(package.roots, vec![0]);
        assert_eq!(package.sections[0].children, vec![1]);
        assert_eq!(package.sections[1].section_type, "button");
    }
}
