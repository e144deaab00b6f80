//! The tool-calling execution loop.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::conversation::ContextManager;
use super::types::{LoopSettings, RunResult};
use crate::error::AgentError;
use crate::provider::ChatProvider;
use crate::tools::{ToolDescriptor, ToolRegistry};
use crate::types::{AssistantTurn, StreamHandler, ToolCall};

/// Callback receiving streamed assistant tokens.
pub type TokenSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Runs one conversation to completion: call the model, dispatch the tools
/// it asks for, feed the results back, repeat.
///
/// A loop owns its [`ContextManager`]; build a new loop for every attempt.
pub struct AgentLoop {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    context: ContextManager,
    settings: LoopSettings,
    token_sink: Option<TokenSink>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        registry: impl Into<Arc<ToolRegistry>>,
        context: ContextManager,
        settings: LoopSettings,
    ) -> Self {
        Self {
            provider,
            registry: registry.into(),
            context,
            settings,
            token_sink: None,
        }
    }

    /// Loop over a fresh conversation seeded with `system_prompt`.
    pub fn with_system_prompt(
        provider: Arc<dyn ChatProvider>,
        registry: impl Into<Arc<ToolRegistry>>,
        system_prompt: impl Into<String>,
        settings: LoopSettings,
    ) -> Self {
        let mut context = ContextManager::new(settings.max_turns);
        context.set_system(system_prompt);
        Self::new(provider, registry, context, settings)
    }

    pub fn with_token_sink(mut self, sink: TokenSink) -> Self {
        self.token_sink = Some(sink);
        self
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn into_context(self) -> ContextManager {
        self.context
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run the loop for one user message.
    ///
    /// Transport and protocol failures, governance denials and failures of
    /// structured tools end the run with an error. Hitting the iteration cap
    /// is a normal result with [`super::RunStatus::MaxIterationsExceeded`].
    pub async fn run(&mut self, user_text: impl Into<String>) -> Result<RunResult, AgentError> {
        let run_id = Uuid::new_v4();
        let tools = self.registry.descriptors();
        let max_iterations = self.settings.max_iterations.max(1);

        info!(
            run_id = %run_id,
            provider = self.provider.provider_name(),
            model = self.provider.model_id(),
            tools = tools.len(),
            max_iterations,
            "agent run start"
        );
        self.context.add_user(user_text);

        let mut last_text = String::new();
        for iteration in 1..=max_iterations {
            let turn = self.call_model(&tools).await.map_err(|err| {
                warn!(run_id = %run_id, iteration, error = %err, "model call failed");
                err
            })?;
            debug!(
                run_id = %run_id,
                iteration,
                text_len = turn.text.len(),
                tool_calls = turn.tool_calls.len(),
                "model call complete"
            );

            last_text = turn.text.clone();
            let calls = turn.tool_calls.clone();
            self.context.add_assistant(turn);

            if calls.is_empty() {
                info!(run_id = %run_id, iterations = iteration, "agent run completed");
                return Ok(RunResult::completed(run_id, last_text, iteration));
            }

            for call in &calls {
                self.dispatch(run_id, call).await?;
            }
        }

        warn!(run_id = %run_id, max_iterations, "agent run hit the iteration cap");
        Ok(RunResult::max_iterations(run_id, last_text, max_iterations))
    }

    async fn call_model(&self, tools: &[ToolDescriptor]) -> Result<AssistantTurn, AgentError> {
        let turns = self.context.messages();
        if self.settings.stream {
            let mut handler = SinkHandler {
                sink: self.token_sink.clone(),
            };
            self.provider.chat_stream(turns, tools, &mut handler).await
        } else {
            self.provider.chat(turns, tools).await
        }
    }

    async fn dispatch(&mut self, run_id: Uuid, call: &ToolCall) -> Result<(), AgentError> {
        info!(run_id = %run_id, tool = call.name(), call_id = call.id(), "dispatching tool call");
        let content = self
            .registry
            .invoke(call.name(), call.arguments())
            .await
            .map_err(|err| {
                warn!(run_id = %run_id, tool = call.name(), error = %err, "tool dispatch failed the run");
                err
            })?;

        if content.starts_with("Error:") {
            self.context.add_tool_error(call, content);
        } else {
            self.context.add_tool_result(call, content);
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("tools", &self.registry.len())
            .field("context", &self.context.id())
            .field("settings", &self.settings)
            .finish()
    }
}

struct SinkHandler {
    sink: Option<TokenSink>,
}

impl StreamHandler for SinkHandler {
    fn on_token(&mut self, text: &str) {
        if let Some(sink) = &self.sink {
            sink(text);
        }
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        debug!(tool = call.name(), call_id = call.id(), "streamed tool call");
    }

    fn on_error(&mut self, error: &AgentError) {
        warn!(error = %error, "stream failed");
    }
}
