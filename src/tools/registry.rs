//! Registry of capabilities offered to the model.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::tool::ToolHost;
use super::types::{ReturnKind, ToolDescriptor, ToolMethod, ToolOutput};
use crate::error::AgentError;
use crate::governance::GovernanceInterceptor;

/// Callable entry point of one capability.
pub type Invoker = Arc<dyn Fn(ToolArguments) -> BoxFuture<'static, Result<ToolOutput, AgentError>> + Send + Sync>;

/// A registered capability: its schema, its metadata and how to call it.
#[derive(Clone)]
pub struct Capability {
    pub descriptor: ToolDescriptor,
    pub method: ToolMethod,
    invoker: Invoker,
}

impl Capability {
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// Turn a failure into model-visible text when the method returns text.
    fn recover(&self, error: AgentError) -> Result<String, AgentError> {
        if error.is_governance_denial() || self.method.returns != ReturnKind::Text {
            return Err(error);
        }
        warn!(tool = %self.method.name, error = %error, "tool failed, reporting to model");
        Ok(error_text(&error))
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("descriptor", &self.descriptor)
            .field("method", &self.method)
            .finish()
    }
}

/// Name-keyed capabilities, built once and shared read-only across runs.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    capabilities: BTreeMap<String, Capability>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every exposed method of `host`.
    pub fn register(&mut self, host: Arc<dyn ToolHost>) -> &mut Self {
        for method in host.tools() {
            if !method.exposed {
                debug!(tool = %method.name, "skipping hidden method");
                continue;
            }
            let invoker = host_invoker(host.clone(), method.name.clone());
            let capability = Capability {
                descriptor: method.descriptor(),
                method,
                invoker,
            };
            let name = capability.method.name.clone();
            if self.capabilities.insert(name.clone(), capability).is_some() {
                warn!(tool = %name, "tool registered twice, keeping the latest");
            }
        }
        self
    }

    /// Builder-style [`Self::register`].
    pub fn with_host(mut self, host: Arc<dyn ToolHost>) -> Self {
        self.register(host);
        self
    }

    /// Wrap every invoker with the governance interceptor.
    pub fn governed(mut self, interceptor: &GovernanceInterceptor) -> Self {
        for capability in self.capabilities.values_mut() {
            capability.invoker = interceptor.wrap(&capability.method, capability.invoker.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    /// Descriptors for every capability, ordered by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.capabilities.values().map(|c| c.descriptor.clone()).collect()
    }

    /// Dispatch a call by name.
    ///
    /// An unknown name yields `"Error: Unknown tool: <name>"` so the model can
    /// correct itself. Failures of text-returning tools become error text;
    /// other failures, and governance denials, are returned as errors.
    pub async fn invoke(&self, name: &str, args: &serde_json::Value) -> Result<String, AgentError> {
        let Some(capability) = self.capabilities.get(name) else {
            warn!(tool = %name, "model requested an unknown tool");
            return Ok(format!("Error: Unknown tool: {name}"));
        };

        let args = match ToolArguments::coerce(args, &capability.method.params) {
            Ok(args) => args,
            Err(error) => return capability.recover(error),
        };

        match (capability.invoker)(args).await {
            Ok(output) => Ok(output.into_text()),
            Err(error) => capability.recover(error),
        }
    }
}

fn host_invoker(host: Arc<dyn ToolHost>, method: String) -> Invoker {
    Arc::new(move |args: ToolArguments| {
        let host = host.clone();
        let method = method.clone();
        async move { host.call(&method, args).await }.boxed()
    })
}

/// The text shown to the model for a failed call.
pub fn error_text(error: &AgentError) -> String {
    match error {
        AgentError::ToolExecution { message, .. } => format!("Error: {message}"),
        other => format!("Error: {other}"),
    }
}
