//! OpenAI Chat Completions API provider.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::AgentError;
use crate::tools::ToolDescriptor;
use crate::types::{AssistantTurn, StreamEvent, ToolCall, Turn};

use super::format::insert_if_some;
use super::http::{bearer_headers, check_status, parse_body, shared_client, sse_stream, SseData};
use super::{ChatProvider, EventStream, RequestOptions};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    model_id: String,
    api_key: String,
    base_url: String,
    options: RequestOptions,
}

impl OpenAiProvider {
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

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request_body(&self, turns: &[Turn], tools: &[ToolDescriptor], stream: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("model".into(), self.model_id.clone().into());
        obj.insert("messages".into(), turns.iter().map(turn_to_openai).collect::<Vec<_>>().into());
        obj.insert("stream".into(), stream.into());
        insert_if_some(&mut obj, "max_tokens", self.options.max_tokens);
        insert_if_some(&mut obj, "temperature", self.options.temperature);

        if !tools.is_empty() {
            let tool_defs: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tool_defs.into());
        }

        Value::Object(obj)
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, AgentError> {
        let resp = shared_client()
            .post(self.url())
            .headers(bearer_headers(&self.api_key))
            .json(body)
            .send()
            .await?;
        check_status(resp).await
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn chat(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Result<AssistantTurn, AgentError> {
        let body = self.build_request_body(turns, tools, false);
        debug!(model = %self.model_id, turns = turns.len(), tools = tools.len(), "OpenAI chat");

        let text = self.send(&body).await?.text().await?;
        let data: OpenAiChatResponse = parse_body("openai", &text)?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::protocol("openai: no choices in response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id.unwrap_or_default(), tc.function.name, Value::String(tc.function.arguments)))
            .collect();

        debug!(finish_reason = ?choice.finish_reason, "OpenAI chat complete");
        Ok(AssistantTurn::new(choice.message.content, tool_calls))
    }

    async fn stream_events(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Result<EventStream, AgentError> {
        let body = self.build_request_body(turns, tools, true);
        debug!(model = %self.model_id, turns = turns.len(), tools = tools.len(), "OpenAI stream");

        let mut sse = sse_stream(self.send(&body).await?);
        let stream = async_stream::stream! {
            let mut finish_reason = None;
            while let Some(item) = sse.next().await {
                match item {
                    Ok(SseData::Data(data)) => match decode_chunk(&data) {
                        Ok((events, finish)) => {
                            if finish.is_some() {
                                finish_reason = finish;
                            }
                            for event in events {
                                yield Ok(event);
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    },
                    Ok(SseData::Done) => break,
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

/// Decode one `chat.completion.chunk` into events plus its finish reason.
fn decode_chunk(data: &str) -> Result<(Vec<StreamEvent>, Option<String>), AgentError> {
    let chunk: OpenAiStreamChunk = parse_body("openai", data)?;
    let mut events = Vec::new();
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok((events, None));
    };

    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
        events.push(StreamEvent::TextDelta { text });
    }
    for tc in choice.delta.tool_calls.unwrap_or_default() {
        let function = tc.function.unwrap_or_default();
        events.push(StreamEvent::ToolCallDelta {
            index: tc.index,
            id: tc.id,
            name: function.name,
            arguments: function.arguments.unwrap_or_default(),
        });
    }
    Ok((events, choice.finish_reason))
}

fn turn_to_openai(turn: &Turn) -> Value {
    match turn {
        Turn::System { text } => json!({ "role": "system", "content": text }),
        Turn::User { text } => json!({ "role": "user", "content": text }),
        Turn::Assistant(assistant) => {
            let mut msg = json!({ "role": "assistant", "content": assistant.text });
            if assistant.has_tool_calls() {
                let calls: Vec<Value> = assistant
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id(),
                            "type": "function",
                            "function": {
                                "name": tc.name(),
                                "arguments": tc.arguments().to_string(),
                            }
                        })
                    })
                    .collect();
                msg["tool_calls"] = calls.into();
            }
            msg
        }
        Turn::ToolResult(result) => json!({
            "role": "tool",
            "tool_call_id": result.tool_call_id,
            "content": result.content,
        }),
    }
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: Option<String>,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiStreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
