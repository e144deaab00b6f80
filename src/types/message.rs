//! Conversation turns and tool-call values.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Conversation role of a [`Turn`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

/// One entry of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    System { text: String },
    User { text: String },
    Assistant(AssistantTurn),
    ToolResult(ToolResultTurn),
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant(AssistantTurn::new(Some(text.into()), Vec::new()))
    }

    /// Assistant turn requesting tool calls. An absent text becomes `""`.
    pub fn assistant_with_tools(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant(AssistantTurn::new(text, tool_calls))
    }

    /// Successful outcome of `call`.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self::ToolResult(ToolResultTurn {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: content.into(),
            is_error: false,
        })
    }

    /// Failed outcome of `call`, still visible to the model.
    pub fn tool_error(call: &ToolCall, content: impl Into<String>) -> Self {
        Self::ToolResult(ToolResultTurn {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: content.into(),
            is_error: true,
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant(_) => Role::Assistant,
            Self::ToolResult(_) => Role::ToolResult,
        }
    }

    /// The textual payload of the turn. Never absent.
    pub fn text(&self) -> &str {
        match self {
            Self::System { text } | Self::User { text } => text,
            Self::Assistant(turn) => &turn.text,
            Self::ToolResult(result) => &result.content,
        }
    }

    /// Tool calls requested by an assistant turn; empty for other roles.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant(turn) => &turn.tool_calls,
            _ => &[],
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

/// A model-produced turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AssistantTurn {
    /// Always present; some providers reject tool-call turns without it.
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn new(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.unwrap_or_default(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

impl From<AssistantTurn> for Turn {
    fn from(turn: AssistantTurn) -> Self {
        Turn::Assistant(turn)
    }
}

/// The outcome of one tool call, correlated by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultTurn {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

/// A tool call requested by the model.
///
/// Fields are private so the arguments stay as they were parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    id: String,
    name: String,
    arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a tool call. An empty id is replaced with a generated one,
    /// and non-object arguments are normalized to an object.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        let id = id.into();
        let id = if id.trim().is_empty() {
            generate_call_id()
        } else {
            id
        };
        Self {
            id,
            name: name.into(),
            arguments: normalize_arguments(arguments),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &serde_json::Value {
        &self.arguments
    }
}

/// Process-unique call identifier for providers that omit one.
pub fn generate_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

fn normalize_arguments(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(_) => value,
        serde_json::Value::String(raw) => match serde_json::from_str::<serde_json::Value>(raw.trim()) {
            Ok(parsed @ serde_json::Value::Object(_)) => parsed,
            _ => serde_json::json!({}),
        },
        _ => serde_json::json!({}),
    }
}
