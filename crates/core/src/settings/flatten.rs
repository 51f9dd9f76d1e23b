//! Parsing settings documents into flat `Section:Key` pairs

use super::SettingsError;
use serde_json::Value;
use std::path::Path;

/// Separator between nested section names in a flattened key
pub const KEY_DELIMITER: &str = ":";

/// Document formats a settings file may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
    /// `.yaml` / `.yml`
    Yaml,
}

impl SettingsFormat {
    /// Detect the format from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Format name used in diagnostics
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
        }
    }

    /// Parse `contents` into a document tree
    pub(crate) fn parse(self, path: &Path, contents: &str) -> Result<Value, SettingsError> {
        let parsed = match self {
            Self::Json => serde_json::from_str::<Value>(contents).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str::<toml::Table>(contents)
                .map(|table| toml_to_json(toml::Value::Table(table)))
                .map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str::<Value>(contents).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| SettingsError::Parse {
            path: path.to_path_buf(),
            format: self.name(),
            message,
        })
    }
}

/// Convert a TOML tree into the common document tree.
///
/// Datetimes become their TOML text so they flatten like any other scalar.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map_or_else(|| Value::String(f.to_string()), Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(name, child)| (name, toml_to_json(child)))
                .collect(),
        ),
    }
}

/// Flatten a document into `(key, value)` pairs.
///
/// Objects contribute their member names, arrays their indices, joined with
/// [`KEY_DELIMITER`]. Scalars become strings and `null` the empty string.
pub(crate) fn flatten(document: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    walk(String::new(), document, &mut pairs);
    pairs
}

fn walk(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(members) => {
            for (name, child) in members {
                walk(join(&prefix, name), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(join(&prefix, &index.to_string()), child, out);
            }
        }
        _ if prefix.is_empty() => {}
        Value::Null => out.push((prefix, String::new())),
        Value::String(s) => out.push((prefix, s.clone())),
        Value::Bool(b) => out.push((prefix, b.to_string())),
        Value::Number(n) => out.push((prefix, n.to_string())),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{KEY_DELIMITER}{name}")
    }
}
