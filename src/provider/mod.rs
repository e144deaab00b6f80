//! Chat provider trait and protocol adapters.

pub(crate) mod format;
pub mod http;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "google")]
pub mod google;

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::models::{ModelSpec, ProviderKind};
use crate::tools::ToolDescriptor;
use crate::types::{AssistantTurn, StreamEvent, StreamHandler, ToolCall, Turn};

/// Stream of decoded provider events.
pub type EventStream = BoxStream<'static, Result<StreamEvent, AgentError>>;

/// Sampling options shared by all adapters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// One wire protocol.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (e.g., "openai", "google").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Request/response call.
    async fn chat(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Result<AssistantTurn, AgentError>;

    /// Open a streaming call and decode it into [`StreamEvent`]s.
    async fn stream_events(&self, turns: &[Turn], tools: &[ToolDescriptor]) -> Result<EventStream, AgentError>;

    /// Streaming call driving `handler`; returns the reconstructed turn.
    async fn chat_stream(
        &self,
        turns: &[Turn],
        tools: &[ToolDescriptor],
        handler: &mut dyn StreamHandler,
    ) -> Result<AssistantTurn, AgentError> {
        match self.stream_events(turns, tools).await {
            Ok(events) => drive_stream(events, handler).await,
            Err(err) => {
                handler.on_error(&err);
                Err(err)
            }
        }
    }
}

/// Consume an event stream, forwarding tokens and emitting tool calls only
/// once the stream has ended.
pub async fn drive_stream(mut events: EventStream, handler: &mut dyn StreamHandler) -> Result<AssistantTurn, AgentError> {
    let mut text = String::new();
    let mut calls = ToolCallAccumulator::new();

    while let Some(event) = events.next().await {
        match event {
            Ok(StreamEvent::TextDelta { text: delta }) => {
                if !delta.is_empty() {
                    handler.on_token(&delta);
                    text.push_str(&delta);
                }
            }
            Ok(StreamEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            }) => calls.push(index, id, name, &arguments),
            Ok(StreamEvent::Done { finish_reason }) => {
                debug!(finish_reason = ?finish_reason, "stream done");
                break;
            }
            Err(err) => {
                handler.on_error(&err);
                return Err(err);
            }
        }
    }

    let tool_calls = calls.finish();
    for call in &tool_calls {
        handler.on_tool_call(call);
    }
    handler.on_complete(&text, &tool_calls);
    Ok(AssistantTurn::new(Some(text), tool_calls))
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Buffers tool-call fragments per stream-local index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialCall>,
    order: Vec<usize>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fragment; id and name are kept from the first fragment carrying them.
    pub fn push(&mut self, index: usize, id: Option<String>, name: Option<String>, fragment: &str) {
        if !self.calls.contains_key(&index) {
            self.order.push(index);
        }
        let call = self.calls.entry(index).or_default();
        if call.id.is_none() {
            call.id = id.filter(|id| !id.is_empty());
        }
        if call.name.is_none() {
            call.name = name.filter(|name| !name.is_empty());
        }
        call.arguments.push_str(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls in first-seen order. Fragments that do not form a JSON
    /// object, or calls without a name, yield nothing.
    pub fn finish(mut self) -> Vec<ToolCall> {
        let mut out = Vec::new();
        for index in self.order {
            let Some(partial) = self.calls.remove(&index) else {
                continue;
            };
            let Some(name) = partial.name else {
                warn!(index, "dropping streamed tool call without a name");
                continue;
            };
            let raw = partial.arguments.trim();
            let arguments = if raw.is_empty() {
                serde_json::json!({})
            } else {
                match serde_json::from_str::<serde_json::Value>(raw) {
                    Ok(value @ serde_json::Value::Object(_)) => value,
                    _ => {
                        warn!(index, tool = %name, "dropping streamed tool call with incomplete arguments");
                        continue;
                    }
                }
            };
            out.push(ToolCall::new(partial.id.unwrap_or_default(), name, arguments));
        }
        out
    }
}

/// Create the adapter for `model`, using keys and base URLs from `config`.
pub fn create_provider(model: &ModelSpec, config: &AgentConfig) -> Result<Box<dyn ChatProvider>, AgentError> {
    create_provider_with_options(model, config, RequestOptions::default())
}

/// [`create_provider`] with sampling options applied to every request.
#[allow(unused_variables)]
pub fn create_provider_with_options(
    model: &ModelSpec,
    config: &AgentConfig,
    options: RequestOptions,
) -> Result<Box<dyn ChatProvider>, AgentError> {
    match model.provider {
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => {
            let api_key = config
                .get_api_key("openai")
                .ok_or_else(|| AgentError::Authentication("Missing OPENAI_API_KEY".into()))?;
            Ok(Box::new(
                openai::OpenAiProvider::new(model.model_id.clone(), api_key, config.get_base_url("openai"))
                    .with_options(options),
            ))
        }
        #[cfg(feature = "anthropic")]
        ProviderKind::Anthropic => {
            let api_key = config
                .get_api_key("anthropic")
                .ok_or_else(|| AgentError::Authentication("Missing ANTHROPIC_API_KEY".into()))?;
            Ok(Box::new(
                anthropic::AnthropicProvider::new(model.model_id.clone(), api_key, config.get_base_url("anthropic"))
                    .with_options(options),
            ))
        }
        #[cfg(feature = "google")]
        ProviderKind::Google => {
            let api_key = config
                .get_api_key("google")
                .ok_or_else(|| AgentError::Authentication("Missing GOOGLE_API_KEY".into()))?;
            Ok(Box::new(
                google::GoogleProvider::new(model.model_id.clone(), api_key, config.get_base_url("google"))
                    .with_options(options),
            ))
        }
        #[allow(unreachable_patterns)]
        _ => Err(AgentError::Configuration(format!(
            "Provider for model '{model}' not enabled via feature flags"
        ))),
    }
}
