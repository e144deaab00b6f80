//! Convenience re-exports for common use.

pub use crate::agent::{AgentLoop, ContextManager, LoopSettings, RunResult, RunStatus};
pub use crate::config::AgentConfig;
pub use crate::error::{AgentError, FailureKind, Result};
pub use crate::governance::{DenialMode, GovernanceInterceptor, Policy, PolicyAction, PolicyRule};
pub use crate::models::{ModelSpec, ProviderKind};
pub use crate::provider::{create_provider, ChatProvider};
pub use crate::tools::{AgentTool, ToolArguments, ToolHost, ToolMethod, ToolOutput, ToolRegistry};
pub use crate::types::{AssistantTurn, Role, StreamHandler, ToolCall, Turn};
pub use crate::util::{run_task, RetryPolicy, TaskOutcome};
