//! Tool descriptions: parameter hints, schemas and outputs.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Primitive type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParamKind {
    Text,
    Integer,
    Boolean,
}

impl ParamKind {
    /// JSON Schema type name.
    pub fn schema_type(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// What a tool method returns on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    /// A text summary; failures are turned into error text for the model.
    #[default]
    Text,
    /// Structured data; failures propagate to the caller.
    Structured,
}

/// Per-parameter hint from a host's description table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// One row of a host's declarative description table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMethod {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub returns: ReturnKind,
    /// Governance resource guarding this method, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Only exposed methods are offered to the model.
    #[serde(default = "default_required")]
    pub exposed: bool,
}

impl ToolMethod {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            returns: ReturnKind::Text,
            resource: None,
            exposed: true,
        }
    }

    fn param(mut self, name: impl Into<String>, kind: ParamKind, description: impl Into<String>, required: bool) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            description: description.into(),
            required,
        });
        self
    }

    pub fn text(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, ParamKind::Text, description, true)
    }

    pub fn optional_text(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, ParamKind::Text, description, false)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, ParamKind::Integer, description, true)
    }

    pub fn optional_integer(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, ParamKind::Integer, description, false)
    }

    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, ParamKind::Boolean, description, true)
    }

    pub fn optional_boolean(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.param(name, ParamKind::Boolean, description, false)
    }

    pub fn returns(mut self, returns: ReturnKind) -> Self {
        self.returns = returns;
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Keep the method callable by the host but hide it from the model.
    pub fn hidden(mut self) -> Self {
        self.exposed = false;
        self
    }

    /// Build the descriptor sent to providers.
    pub fn descriptor(&self) -> ToolDescriptor {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            properties.insert(
                param.name.clone(),
                serde_json::json!({
                    "type": param.kind.schema_type(),
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(param.name.clone());
            }
        }
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// `{"type":"object","properties":{..},"required":[..]}`
    pub parameters: serde_json::Value,
}

/// Successful tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Structured(serde_json::Value),
}

impl ToolOutput {
    /// Render as the text placed in the tool result turn.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(serde_json::Value::String(text)) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for ToolOutput {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}
