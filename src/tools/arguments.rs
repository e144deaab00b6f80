//! Typed access to tool call arguments.

use serde_json::{Map, Value};

use super::types::{ParamKind, ParamSpec};
use crate::error::AgentError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: Value,
}

impl Default for ToolArguments {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| AgentError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    pub fn get_i64_opt(&self, key: &str) -> Option<i64> {
        self.value.get(key).and_then(|v| v.as_i64())
    }

    /// Get a boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| AgentError::InvalidArgument(format!("Missing boolean argument: {key}")))
    }

    pub fn get_bool_opt(&self, key: &str) -> Option<bool> {
        self.value.get(key).and_then(|v| v.as_bool())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, AgentError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            AgentError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }

    /// Copy with backslashes in path-like string arguments turned into `/`.
    pub fn with_normalized_paths(&self) -> Self {
        let Value::Object(map) = &self.value else {
            return self.clone();
        };
        let normalized = map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) if is_path_like(key, s) => Value::String(s.replace('\\', "/")),
                    other => other.clone(),
                };
                (key.clone(), value)
            })
            .collect();
        Self::new(Value::Object(normalized))
    }

    /// Coerce raw model-supplied values to the declared parameter kinds.
    ///
    /// Unknown keys pass through untouched; a missing required parameter or
    /// an uncoercible value is an [`AgentError::InvalidArgument`].
    pub fn coerce(raw: &Value, params: &[ParamSpec]) -> Result<Self, AgentError> {
        let mut map = match raw {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(AgentError::InvalidArgument(format!(
                    "expected object arguments, got {other}"
                )))
            }
        };

        for param in params {
            match map.remove(&param.name) {
                Some(Value::Null) | None => {
                    if param.required {
                        return Err(AgentError::InvalidArgument(format!(
                            "missing required parameter '{}'",
                            param.name
                        )));
                    }
                }
                Some(value) => {
                    let coerced = coerce_value(&param.name, param.kind, value)?;
                    map.insert(param.name.clone(), coerced);
                }
            }
        }

        Ok(Self::new(Value::Object(map)))
    }
}

fn coerce_value(name: &str, kind: ParamKind, value: Value) -> Result<Value, AgentError> {
    let mismatch = |value: &Value| {
        AgentError::InvalidArgument(format!("parameter '{name}' expected {kind}, got {value}"))
    };
    match kind {
        ParamKind::Text => Ok(match value {
            Value::String(_) => value,
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => Value::String(other.to_string()),
        }),
        ParamKind::Integer => match &value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(Value::from)
                .ok_or_else(|| mismatch(&value)),
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        ParamKind::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch(&value)),
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(mismatch(&value)),
            },
            _ => Err(mismatch(&value)),
        },
    }
}

fn is_path_like(key: &str, value: &str) -> bool {
    let key = key.to_ascii_lowercase();
    value.contains('\\')
        && (key.contains("path") || key.contains("file") || key.contains("dir") || !value.contains(' '))
}
