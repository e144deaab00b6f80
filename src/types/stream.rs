//! Streaming events and callbacks.

use serde::{Deserialize, Serialize};

use super::message::ToolCall;
use crate::error::AgentError;

/// A decoded provider stream event, before tool-call reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental assistant text.
    TextDelta { text: String },
    /// A fragment of a tool call, correlated by a stream-local index.
    ///
    /// `id` and `name` usually arrive on the first fragment only.
    ToolCallDelta {
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        arguments: String,
    },
    /// The provider signalled the end of the response.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

/// Receives streaming progress for one model call.
///
/// Callbacks run on the task that reads the event stream, one at a time.
pub trait StreamHandler: Send {
    fn on_token(&mut self, text: &str);

    /// Called once per reconstructed tool call, after the stream ended.
    fn on_tool_call(&mut self, _call: &ToolCall) {}

    fn on_complete(&mut self, _text: &str, _tool_calls: &[ToolCall]) {}

    fn on_error(&mut self, _error: &AgentError) {}
}

/// Handler that ignores all events.
#[derive(Debug, Default)]
pub struct NoopStreamHandler;

impl StreamHandler for NoopStreamHandler {
    fn on_token(&mut self, _text: &str) {}
}
