//! Provider formatting helpers.

use serde_json::{Map, Value};

/// Rewrite a JSON schema for Gemini function declarations: `type` values are
/// upper-cased (`"string"` -> `"STRING"`), recursively.
pub(crate) fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let value = match (key.as_str(), value) {
                    ("type", Value::String(kind)) => Value::String(kind.to_uppercase()),
                    ("properties", Value::Object(props)) => Value::Object(
                        props.iter().map(|(name, prop)| (name.clone(), gemini_schema(prop))).collect(),
                    ),
                    ("items", items) => gemini_schema(items),
                    _ => value.clone(),
                };
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Insert `value` under `key` when it is set.
pub(crate) fn insert_if_some<T: Into<Value>>(obj: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        obj.insert(key.to_string(), value.into());
    }
}
