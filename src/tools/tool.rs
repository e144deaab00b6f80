//! Host objects that expose tools, and a closure-based single tool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use super::arguments::ToolArguments;
use super::types::{ToolMethod, ToolOutput};
use crate::error::AgentError;

/// An object exposing callable capabilities to the model.
///
/// `tools` is the declarative description table for the host's methods;
/// `call` dispatches one of them by name with coerced arguments.
#[async_trait]
pub trait ToolHost: Send + Sync {
    fn tools(&self) -> Vec<ToolMethod>;

    async fn call(&self, method: &str, args: ToolArguments) -> Result<ToolOutput, AgentError>;
}

/// Type alias for the tool handler function.
type ToolHandler = dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<ToolOutput, AgentError>> + Send>>
    + Send
    + Sync;

/// Closure-based host exposing exactly one tool.
pub struct AgentTool {
    method: ToolMethod,
    handler: Arc<ToolHandler>,
}

impl AgentTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(method: ToolMethod, handler: F) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, AgentError>> + Send + 'static,
    {
        Self {
            method,
            handler: Arc::new(move |args: ToolArguments| handler(args).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.method.name
    }
}

#[async_trait]
impl ToolHost for AgentTool {
    fn tools(&self) -> Vec<ToolMethod> {
        vec![self.method.clone()]
    }

    async fn call(&self, method: &str, args: ToolArguments) -> Result<ToolOutput, AgentError> {
        if method != self.method.name {
            return Err(AgentError::tool(method, "not provided by this host"));
        }
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.method.name)
            .field("description", &self.method.description)
            .finish()
    }
}
