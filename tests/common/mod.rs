//! Shared test helpers: a scripted provider and a file-like tool host.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;

use testsmith::error::AgentError;
use testsmith::provider::{ChatProvider, EventStream};
use testsmith::tools::{ReturnKind, ToolArguments, ToolDescriptor, ToolHost, ToolMethod, ToolOutput};
use testsmith::types::{AssistantTurn, StreamEvent, ToolCall, Turn};

/// A provider that replays queued turns and records every request.
pub struct MockProvider {
    model_id: String,
    responses: Mutex<VecDeque<Result<AssistantTurn, AgentError>>>,
    /// Replayed once the queue is empty.
    fallback: Option<AssistantTurn>,
    requests: Mutex<Vec<Vec<Turn>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            model_id: "mock-model".to_string(),
            responses: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `turn` once the queue runs dry.
    pub fn repeating(turn: AssistantTurn) -> Self {
        Self {
            fallback: Some(turn),
            ..Self::new()
        }
    }

    pub fn queue_text(&self, text: &str) -> &Self {
        self.queue(Ok(AssistantTurn::new(Some(text.to_string()), Vec::new())))
    }

    pub fn queue_tool_call(&self, id: &str, name: &str, args: serde_json::Value) -> &Self {
        self.queue(Ok(AssistantTurn::new(None, vec![ToolCall::new(id, name, args)])))
    }

    pub fn queue_error(&self, error: AgentError) -> &Self {
        self.queue(Err(error))
    }

    pub fn queue(&self, response: Result<AssistantTurn, AgentError>) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, turns: &[Turn]) -> Result<AssistantTurn, AgentError> {
        self.requests.lock().unwrap().push(turns.to_vec());
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        let turn = self
            .fallback
            .as_ref()
            .ok_or_else(|| AgentError::protocol("mock provider has no scripted response"))?;
        // Each replay gets fresh call ids, as a real model would produce.
        let calls = turn
            .tool_calls
            .iter()
            .map(|call| ToolCall::new("", call.name(), call.arguments().clone()))
            .collect();
        Ok(AssistantTurn::new(Some(turn.text.clone()), calls))
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn chat(&self, turns: &[Turn], _tools: &[ToolDescriptor]) -> Result<AssistantTurn, AgentError> {
        self.next(turns)
    }

    /// Replays the next turn as word-sized text deltas and tool calls whose
    /// arguments arrive in two fragments.
    async fn stream_events(&self, turns: &[Turn], _tools: &[ToolDescriptor]) -> Result<EventStream, AgentError> {
        let turn = self.next(turns)?;
        let mut events = Vec::new();
        for word in turn.text.split_inclusive(' ') {
            events.push(Ok(StreamEvent::TextDelta { text: word.to_string() }));
        }
        for (index, call) in turn.tool_calls.iter().enumerate() {
            let args = call.arguments().to_string();
            let (head, tail) = args.split_at(args.len() / 2);
            events.push(Ok(StreamEvent::ToolCallDelta {
                index,
                id: Some(call.id().to_string()),
                name: Some(call.name().to_string()),
                arguments: head.to_string(),
            }));
            events.push(Ok(StreamEvent::ToolCallDelta {
                index,
                id: None,
                name: None,
                arguments: tail.to_string(),
            }));
        }
        events.push(Ok(StreamEvent::Done { finish_reason: None }));
        Ok(futures::stream::iter(events).boxed())
    }
}

/// An in-memory workspace exposing file tools to the model.
#[derive(Default)]
pub struct MockWorkspace {
    files: Mutex<BTreeMap<String, String>>,
}

impl MockWorkspace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_file(self: Arc<Self>, path: &str, content: &str) -> Arc<Self> {
        self.files.lock().unwrap().insert(path.to_string(), content.to_string());
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl ToolHost for MockWorkspace {
    fn tools(&self) -> Vec<ToolMethod> {
        vec![
            ToolMethod::new("read_file", "Read a file from the workspace")
                .text("path", "Workspace-relative path")
                .resource("filesystem.read"),
            ToolMethod::new("write_file", "Write a file in the workspace")
                .text("path", "Workspace-relative path")
                .text("content", "New file content")
                .resource("filesystem.write"),
            ToolMethod::new("line_count", "Count lines of a file")
                .text("path", "Workspace-relative path")
                .returns(ReturnKind::Structured),
            ToolMethod::new("snapshot", "Dump every file").hidden(),
        ]
    }

    async fn call(&self, method: &str, args: ToolArguments) -> Result<ToolOutput, AgentError> {
        match method {
            "read_file" => {
                let path = args.get_str("path")?;
                self.file(path)
                    .map(ToolOutput::Text)
                    .ok_or_else(|| AgentError::tool(method, format!("File not found: {path}")))
            }
            "write_file" => {
                let path = args.get_str("path")?.to_string();
                let content = args.get_str("content")?.to_string();
                let bytes = content.len();
                self.files.lock().unwrap().insert(path.clone(), content);
                Ok(format!("Wrote {bytes} bytes to {path}").into())
            }
            "line_count" => {
                let path = args.get_str("path")?;
                let content = self
                    .file(path)
                    .ok_or_else(|| AgentError::tool(method, format!("File not found: {path}")))?;
                Ok(json!({ "path": path, "lines": content.lines().count() }).into())
            }
            "snapshot" => Ok(json!(*self.files.lock().unwrap()).into()),
            other => Err(AgentError::tool(other, "unknown method")),
        }
    }
}
