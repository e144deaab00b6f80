//! Google Gemini API provider.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::AgentError;
use crate::tools::ToolDescriptor;
use crate::types::{AssistantTurn, StreamEvent, ToolCall, Turn};

use super::format::{gemini_schema, insert_if_some};
use super::http::{check_status, parse_body, shared_client, sse_stream, SseData};
use super::{ChatProvider, EventStream, RequestOptions};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleProvider {
    model_id: String,
    api_key: String,
    base_url: String,
    options: RequestOptions,
}

impl GoogleProvider {
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

    fn build_request_body(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Value {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        let mut pending_responses: Vec<Value> = Vec::new();

        for turn in turns {
            if let Turn::ToolResult(result) = turn {
                pending_responses.push(json!({
                    "functionResponse": {
                        "name": result.tool_name,
                        "response": { "content": result.content },
                    }
                }));
                continue;
            }
            if !pending_responses.is_empty() {
                contents.push(json!({ "role": "user", "parts": std::mem::take(&mut pending_responses) }));
            }
            match turn {
                Turn::System { text } => system_parts.push(json!({ "text": text })),
                Turn::User { text } => contents.push(json!({ "role": "user", "parts": [{ "text": text }] })),
                Turn::Assistant(assistant) => contents.push(assistant_to_gemini(assistant)),
                Turn::ToolResult(_) => {}
            }
        }
        if !pending_responses.is_empty() {
            contents.push(json!({ "role": "user", "parts": pending_responses }));
        }

        let mut obj = Map::new();
        obj.insert("contents".into(), contents.into());
        if !system_parts.is_empty() {
            obj.insert("systemInstruction".into(), json!({ "parts": system_parts }));
        }

        let mut gen_config = Map::new();
        insert_if_some(&mut gen_config, "maxOutputTokens", self.options.max_tokens);
        insert_if_some(&mut gen_config, "temperature", self.options.temperature);
        if !gen_config.is_empty() {
            obj.insert("generationConfig".into(), Value::Object(gen_config));
        }

        if !tools.is_empty() {
            let fn_decls: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": gemini_schema(&t.parameters),
                    })
                })
                .collect();
            obj.insert("tools".into(), json!([{ "functionDeclarations": fn_decls }]));
        }

        Value::Object(obj)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{method}", self.base_url.trim_end_matches('/'), self.model_id)
    }
}

#[async_trait]
impl ChatProvider for GoogleProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn chat(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Result<AssistantTurn, AgentError> {
        let body = self.build_request_body(turns, tools);
        debug!(model = %self.model_id, turns = turns.len(), tools = tools.len(), "Google chat");

        let resp = shared_client()
            .post(self.endpoint("generateContent"))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let text = check_status(resp).await?.text().await?;
        let data: GeminiResponse = parse_body("google", &text)?;

        let candidate = data
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::protocol("google: no candidates in response"))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(fc) = part.function_call {
                tool_calls.push(ToolCall::new(String::new(), fc.name, fc.args));
            }
        }

        debug!(finish_reason = ?candidate.finish_reason, "Google chat complete");
        Ok(AssistantTurn::new(Some(text), tool_calls))
    }

    async fn stream_events(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Result<EventStream, AgentError> {
        let body = self.build_request_body(turns, tools);
        debug!(model = %self.model_id, turns = turns.len(), tools = tools.len(), "Google stream");

        let resp = shared_client()
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let mut sse = sse_stream(check_status(resp).await?);

        let stream = async_stream::stream! {
            let mut decoder = StreamDecoder::default();
            while let Some(item) = sse.next().await {
                match item {
                    Ok(SseData::Data(data)) => match decoder.decode(&data) {
                        Ok(events) => {
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
            yield Ok(StreamEvent::Done { finish_reason: decoder.finish_reason });
        };

        Ok(stream.boxed())
    }
}

/// Function calls arrive whole; each gets the next stream-local index.
#[derive(Debug, Default)]
struct StreamDecoder {
    next_index: usize,
    finish_reason: Option<String>,
}

impl StreamDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<StreamEvent>, AgentError> {
        let chunk: GeminiResponse = parse_body("google", data)?;
        let mut events = Vec::new();
        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(events);
        };
        if candidate.finish_reason.is_some() {
            self.finish_reason = candidate.finish_reason;
        }
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::TextDelta { text });
            }
            if let Some(fc) = part.function_call {
                events.push(StreamEvent::ToolCallDelta {
                    index: self.next_index,
                    id: None,
                    name: Some(fc.name),
                    // Calls without `args` must still parse as an empty object.
                    arguments: if fc.args.is_null() { String::new() } else { fc.args.to_string() },
                });
                self.next_index += 1;
            }
        }
        Ok(events)
    }
}

fn assistant_to_gemini(assistant: &AssistantTurn) -> Value {
    let mut parts = Vec::with_capacity(assistant.tool_calls.len() + 1);
    if !assistant.text.is_empty() || !assistant.has_tool_calls() {
        parts.push(json!({ "text": assistant.text }));
    }
    for call in &assistant.tool_calls {
        parts.push(json!({ "functionCall": { "name": call.name(), "args": call.arguments() } }));
    }
    json!({ "role": "model", "parts": parts })
}

// Gemini API response types (internal)

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}
