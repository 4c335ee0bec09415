//! String-valued field tables.
//!
//! Every variable a template can see is a string. Records expose their fields
//! through [`ToFields`], built from a fixed list of names and accessors.

use crate::error::{KasumiError, Result};
use serde_json::{Map, Value as JsonValue};

pub use kasumi_ast::Fields;

/// Records that can be viewed as a `{field name: value}` table.
pub trait ToFields {
    fn fields(&self) -> Fields;
}

/// Build a table from a fixed list of `(name, accessor)` pairs.
pub fn fields_from<T>(record: &T, accessors: &[(&str, fn(&T) -> &str)]) -> Fields {
    accessors
        .iter()
        .map(|(name, get)| (name.to_string(), get(record).to_string()))
        .collect()
}

/// A resolved value is truthy iff it is present and non-empty.
pub fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|s| !s.is_empty())
}

/// Convert a scalar JSON value to its string form.
///
/// `false` becomes the empty string so it tests falsy; null and
/// nested values have no string form.
pub fn stringify(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(true) => Some("true".to_string()),
        JsonValue::Bool(false) => Some(String::new()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Collect the scalar members of a JSON object.
pub fn fields_from_json(object: &Map<String, JsonValue>) -> Fields {
    object
        .iter()
        .filter_map(|(key, value)| stringify(value).map(|s| (key.clone(), s)))
        .collect()
}

/// Convert every element of a JSON array into a field table.
pub fn collection_from_json(name: &str, items: &[JsonValue]) -> Result<Vec<Fields>> {
    items
        .iter()
        .map(|item| match item {
            JsonValue::Object(obj) => Ok(fields_from_json(obj)),
            other => Err(KasumiError::TypeError {
                message: format!("Collection '{name}' must contain objects, got {other}"),
            }),
        })
        .collect()
}
