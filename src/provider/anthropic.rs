//! Anthropic Messages API provider.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::AgentError;
use crate::tools::ToolDescriptor;
use crate::types::{AssistantTurn, StreamEvent, ToolCall, Turn};

use super::format::insert_if_some;
use super::http::{anthropic_headers, check_status, parse_body, shared_client, sse_stream, SseData};
use super::{ChatProvider, EventStream, RequestOptions};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
/// `max_tokens` is mandatory on this API.
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    model_id: String,
    api_key: String,
    base_url: String,
    options: RequestOptions,
}

impl AnthropicProvider {
    pub fn new(model_id: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model_id: model_id.into(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    fn build_request_body(&self, turns: &[Turn], tools: &[ToolDescriptor], stream: bool) -> Value {
        let mut system_parts = Vec::new();
        let mut messages: Vec<Value> = Vec::new();
        // Content blocks of consecutive tool results, flushed as one user turn.
        let mut pending_results: Vec<Value> = Vec::new();

        for turn in turns {
            if let Turn::ToolResult(result) = turn {
                let mut block = json!({
                    "type": "tool_result",
                    "tool_use_id": result.tool_call_id,
                    "content": result.content,
                });
                if result.is_error {
                    block["is_error"] = true.into();
                }
                pending_results.push(block);
                continue;
            }
            if !pending_results.is_empty() {
                messages.push(json!({ "role": "user", "content": std::mem::take(&mut pending_results) }));
            }
            match turn {
                Turn::System { text } => system_parts.push(text.clone()),
                Turn::User { text } => messages.push(json!({ "role": "user", "content": text })),
                Turn::Assistant(assistant) => messages.push(assistant_to_anthropic(assistant)),
                Turn::ToolResult(_) => {}
            }
        }
        if !pending_results.is_empty() {
            messages.push(json!({ "role": "user", "content": pending_results }));
        }

        let mut obj = Map::new();
        obj.insert("model".into(), self.model_id.clone().into());
        obj.insert("messages".into(), messages.into());
        obj.insert(
            "max_tokens".into(),
            self.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS).into(),
        );
        if stream {
            obj.insert("stream".into(), true.into());
        }
        if !system_parts.is_empty() {
            obj.insert("system".into(), system_parts.join("\n\n").into());
        }
        insert_if_some(&mut obj, "temperature", self.options.temperature);

        if !tools.is_empty() {
            let tool_defs: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            obj.insert("tools".into(), tool_defs.into());
        }

        Value::Object(obj)
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, AgentError> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let resp = shared_client()
            .post(&url)
            .headers(anthropic_headers(&self.api_key, API_VERSION))
            .json(body)
            .send()
            .await?;
        check_status(resp).await
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn chat(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Result<AssistantTurn, AgentError> {
        let body = self.build_request_body(turns, tools, false);
        debug!(model = %self.model_id, turns = turns.len(), tools = tools.len(), "Anthropic chat");

        let text = self.send(&body).await?.text().await?;
        let data: AnthropicResponse = parse_body("anthropic", &text)?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in data.content {
            match block {
                AnthropicContent::Text { text: t } => text.push_str(&t),
                AnthropicContent::ToolUse { id, name, input } => tool_calls.push(ToolCall::new(id, name, input)),
                AnthropicContent::Other => {}
            }
        }

        debug!(stop_reason = ?data.stop_reason, "Anthropic chat complete");
        Ok(AssistantTurn::new(Some(text), tool_calls))
    }

    async fn stream_events(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Result<EventStream, AgentError> {
        let body = self.build_request_body(turns, tools, true);
        debug!(model = %self.model_id, turns = turns.len(), tools = tools.len(), "Anthropic stream");

        let mut sse = sse_stream(self.send(&body).await?);
        let stream = async_stream::stream! {
            let mut finish_reason = None;
            while let Some(item) = sse.next().await {
                let data = match item {
                    Ok(SseData::Data(data)) => data,
                    Ok(SseData::Done) => break,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                match decode_event(&data) {
                    Ok(Decoded::Event(event)) => yield Ok(event),
                    Ok(Decoded::StopReason(reason)) => finish_reason = Some(reason),
                    Ok(Decoded::MessageStop) => break,
                    Ok(Decoded::Skip) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
            yield Ok(StreamEvent::Done { finish_reason });
        };

        Ok(stream.boxed())
    }
}

#[derive(Debug, PartialEq)]
enum Decoded {
    Event(StreamEvent),
    StopReason(String),
    MessageStop,
    Skip,
}

fn decode_event(data: &str) -> Result<Decoded, AgentError> {
    let event: Value = parse_body("anthropic", data)?;
    let index = || event.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;

    let decoded = match event.get("type").and_then(Value::as_str).unwrap_or("") {
        "content_block_start" => {
            let block = event.get("content_block");
            match block.and_then(|b| b.get("type")).and_then(Value::as_str) {
                Some("tool_use") => Decoded::Event(StreamEvent::ToolCallDelta {
                    index: index(),
                    id: block.and_then(|b| b.get("id")).and_then(Value::as_str).map(str::to_string),
                    name: block.and_then(|b| b.get("name")).and_then(Value::as_str).map(str::to_string),
                    arguments: String::new(),
                }),
                Some("text") => match block.and_then(|b| b.get("text")).and_then(Value::as_str) {
                    Some(text) if !text.is_empty() => Decoded::Event(StreamEvent::TextDelta { text: text.to_string() }),
                    _ => Decoded::Skip,
                },
                _ => Decoded::Skip,
            }
        }
        "content_block_delta" => {
            let delta = event.get("delta");
            let field = |name: &str| delta.and_then(|d| d.get(name)).and_then(Value::as_str).map(str::to_string);
            match delta.and_then(|d| d.get("type")).and_then(Value::as_str) {
                Some("text_delta") => match field("text") {
                    Some(text) => Decoded::Event(StreamEvent::TextDelta { text }),
                    None => Decoded::Skip,
                },
                Some("input_json_delta") => Decoded::Event(StreamEvent::ToolCallDelta {
                    index: index(),
                    id: None,
                    name: None,
                    arguments: field("partial_json").unwrap_or_default(),
                }),
                _ => Decoded::Skip,
            }
        }
        "message_delta" => match event
            .get("delta")
            .and_then(|d| d.get("stop_reason"))
            .and_then(Value::as_str)
        {
            Some(reason) => Decoded::StopReason(reason.to_string()),
            None => Decoded::Skip,
        },
        "message_stop" => Decoded::MessageStop,
        "error" => {
            let message = event
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error");
            return Err(AgentError::protocol(format!("anthropic: {message}")));
        }
        _ => Decoded::Skip,
    };
    Ok(decoded)
}

fn assistant_to_anthropic(assistant: &AssistantTurn) -> Value {
    if !assistant.has_tool_calls() {
        return json!({ "role": "assistant", "content": assistant.text });
    }
    let mut blocks = Vec::with_capacity(assistant.tool_calls.len() + 1);
    if !assistant.text.is_empty() {
        blocks.push(json!({ "type": "text", "text": assistant.text }));
    }
    for call in &assistant.tool_calls {
        blocks.push(json!({
            "type": "tool_use",
            "id": call.id(),
            "name": call.name(),
            "input": call.arguments(),
        }));
    }
    json!({ "role": "assistant", "content": blocks })
}

// Anthropic API response types (internal)

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}
