//! Policy enforcement around tool dispatch.
//!
//! [`GovernanceInterceptor::wrap`] decorates a capability's invoker. Every
//! call is logged; calls to capabilities that declare a resource are checked
//! against the first matching [`PolicyRule`] before the tool runs.

pub mod condition;
pub mod policy;

pub use condition::Condition;
pub use policy::{DenialMode, Policy, PolicyAction, PolicyConfig, PolicyRule, PolicyRuleConfig};

use std::sync::Arc;

use futures::FutureExt;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::tools::{error_text, Invoker, ReturnKind, ToolArguments, ToolMethod, ToolOutput};

/// Decorates invokers with policy checks and audit logging.
#[derive(Debug, Clone)]
pub struct GovernanceInterceptor {
    policy: Arc<Policy>,
}

impl GovernanceInterceptor {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Check a call against the policy without running it.
    pub fn check(&self, method: &ToolMethod, args: &ToolArguments) -> Result<(), AgentError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let Some(resource) = method.resource.as_deref() else {
            return Ok(());
        };
        let Some(rule) = self.policy.rule_for(resource) else {
            return Ok(());
        };

        let denied = |reason: String| AgentError::GovernanceDenied {
            tool: method.name.clone(),
            resource: resource.to_string(),
            reason,
        };

        match (rule.action, &rule.condition) {
            (PolicyAction::Allow, Some(condition)) if !condition.evaluate(args.raw()) => {
                Err(denied(format!("condition not satisfied: {condition}")))
            }
            (PolicyAction::Allow, _) => Ok(()),
            (PolicyAction::Deny, None) => Err(denied("denied by policy".to_string())),
            (PolicyAction::Deny, Some(condition)) if condition.evaluate(args.raw()) => {
                Err(denied(format!("denied by policy: {condition}")))
            }
            (PolicyAction::Deny, Some(_)) => Ok(()),
        }
    }

    /// `invoker' = governance(invoker)`.
    pub fn wrap(&self, method: &ToolMethod, inner: Invoker) -> Invoker {
        let this = self.clone();
        let method = Arc::new(method.clone());
        Arc::new(move |args: ToolArguments| {
            let this = this.clone();
            let method = method.clone();
            let inner = inner.clone();
            async move { this.intercept(&method, inner, args).await }.boxed()
        })
    }

    async fn intercept(
        &self,
        method: &ToolMethod,
        inner: Invoker,
        args: ToolArguments,
    ) -> Result<ToolOutput, AgentError> {
        let args = args.with_normalized_paths();
        info!(tool = %method.name, args = %args.raw(), "tool call");

        if let Err(denial) = self.check(method, &args) {
            warn!(tool = %method.name, error = %denial, "tool call denied");
            return match self.policy.denial_mode {
                DenialMode::Fail => Err(denial),
                DenialMode::Explain => Ok(ToolOutput::Text(error_text(&denial))),
            };
        }

        match inner(args).await {
            Ok(output) => {
                info!(tool = %method.name, result = ?output, "tool result");
                Ok(output)
            }
            Err(error) if method.returns == ReturnKind::Text && !error.is_governance_denial() => {
                warn!(tool = %method.name, error = %error, "tool failed");
                Ok(ToolOutput::Text(error_text(&error)))
            }
            Err(error) => Err(error),
        }
    }
}
