//! Collecting and writing the attributes of one element.

use jadeite_expr::value;
use jadeite_expr::Map;
use jadeite_expr::Value;

use crate::escape::escape_html;

/// Attributes of one element, in output order.
///
/// Classes from every source are gathered into a single `class` attribute
/// written first. Other attributes keep the position of their first
/// occurrence; later values for the same name overwrite earlier ones.
#[derive(Debug, Default)]
pub(crate) struct AttributeSet {
    classes: Vec<String>,
    entries: Vec<(String, Value)>,
}

impl AttributeSet {
    pub(crate) fn add_class(&mut self, class: &Value, escaped: bool) {
        match class {
            Value::Null | Value::Bool(_) => {}
            Value::Array(items) => {
                for item in items {
                    self.add_class(item, escaped);
                }
            }
            Value::Object(map) => {
                for (name, enabled) in map {
                    if value::is_truthy(enabled) {
                        self.push_class(name, escaped);
                    }
                }
            }
            other => {
                if let Some(text) = value::to_display(other) {
                    self.push_class(&text, escaped);
                }
            }
        }
    }

    fn push_class(&mut self, class: &str, escaped: bool) {
        if class.is_empty() {
            return;
        }
        if escaped {
            self.classes.push(escape_html(class).into_owned());
        } else {
            self.classes.push(class.to_string());
        }
    }

    pub(crate) fn set(&mut self, name: &str, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(key, _)| key == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Merge an `&attributes` map. Values are taken as they are.
    pub(crate) fn merge(&mut self, map: &Map<String, Value>) {
        for (name, value) in map {
            match name.as_str() {
                "class" => self.add_class(value, false),
                "style" => self.set(name, style(value)),
                _ => self.set(name, value.clone()),
            }
        }
    }

    /// The attributes as a map, the way mixins see them as `attributes`.
    pub(crate) fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        if !self.classes.is_empty() {
            map.insert("class".to_string(), Value::String(self.classes.join(" ")));
        }
        for (name, value) in self.entries {
            map.insert(name, value);
        }
        map
    }

    pub(crate) fn write(&self, out: &mut String, terse: bool) {
        if !self.classes.is_empty() {
            write_pair(out, "class", &self.classes.join(" "));
        }
        for (name, value) in &self.entries {
            write_attribute(out, name, value, terse);
        }
    }
}

/// Prepare an evaluated value for output as attribute `name`.
///
/// Maps given for `style` become `key:value;` declarations. Escaped
/// attributes have their text escaped now; non-string values are written as
/// JSON.
pub(crate) fn prepare(name: &str, value: Value, escaped: bool) -> Value {
    let value = if name == "style" { style(&value) } else { value };
    if !escaped {
        return value;
    }
    match value {
        Value::String(text) => Value::String(escape_html(&text).into_owned()),
        Value::Array(_) | Value::Object(_) => {
            Value::String(escape_html(&value.to_string()).into_owned())
        }
        other => other,
    }
}

fn style(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::String(
            map.iter()
                .filter_map(|(key, value)| {
                    value::to_display(value).map(|value| format!("{key}:{value};"))
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn write_attribute(out: &mut String, name: &str, value: &Value, terse: bool) {
    match value {
        Value::Null | Value::Bool(false) => {}
        Value::Bool(true) => {
            if terse {
                out.push(' ');
                out.push_str(name);
            } else {
                write_pair(out, name, name);
            }
        }
        Value::String(text) => {
            if !(text.is_empty() && name == "style") {
                write_pair(out, name, text);
            }
        }
        Value::Number(number) => write_pair(out, name, &value::format_json_number(number)),
        Value::Array(_) | Value::Object(_) => {
            let json = value.to_string();
            if json.contains('"') {
                out.push(' ');
                out.push_str(name);
                out.push_str("='");
                out.push_str(&json.replace('\'', "&#39;"));
                out.push('\'');
            } else {
                write_pair(out, name, &json);
            }
        }
    }
}

fn write_pair(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(value);
    out.push('"');
}
