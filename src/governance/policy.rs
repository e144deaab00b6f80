//! Declarative access policy for tool dispatch.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::condition::Condition;
use crate::error::AgentError;

/// What a matching rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum PolicyAction {
    #[serde(alias = "allow")]
    Allow,
    #[serde(alias = "deny")]
    Deny,
}

/// How a denial reaches the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialMode {
    /// Abort the run with [`AgentError::GovernanceDenied`].
    #[default]
    Fail,
    /// Report the denial to the model as a tool error so it can choose
    /// another, permitted action.
    Explain,
}

/// One rule as written in the policy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRuleConfig {
    pub resource: String,
    pub action: PolicyAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Policy file layout:
///
/// ```toml
/// enabled = true
/// denial_mode = "fail"
///
/// [[rules]]
/// resource = "filesystem.write"
/// action = "ALLOW"
/// condition = 'path starts with "src/test/"'
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub denial_mode: DenialMode,
    #[serde(default)]
    pub rules: Vec<PolicyRuleConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            denial_mode: DenialMode::default(),
            rules: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    resource: String,
    matcher: Option<Regex>,
    pub action: PolicyAction,
    pub condition: Option<Condition>,
}

impl PolicyRule {
    pub fn new(resource: impl Into<String>, action: PolicyAction, condition: Option<&str>) -> Result<Self, AgentError> {
        let resource = resource.into();
        let matcher = if resource.contains('*') {
            let pattern = format!("^{}$", regex::escape(&resource).replace("\\*", ".*"));
            Some(Regex::new(&pattern).map_err(|e| {
                AgentError::Configuration(format!("invalid resource pattern '{resource}': {e}"))
            })?)
        } else {
            None
        };
        let condition = condition
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Condition::parse)
            .transpose()?;
        Ok(Self {
            resource,
            matcher,
            action,
            condition,
        })
    }

    pub fn allow(resource: impl Into<String>, condition: Option<&str>) -> Result<Self, AgentError> {
        Self::new(resource, PolicyAction::Allow, condition)
    }

    pub fn deny(resource: impl Into<String>, condition: Option<&str>) -> Result<Self, AgentError> {
        Self::new(resource, PolicyAction::Deny, condition)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Exact name, or `*` glob.
    pub fn matches(&self, resource: &str) -> bool {
        match &self.matcher {
            Some(regex) => regex.is_match(resource),
            None => self.resource == resource,
        }
    }
}

/// Ordered rules; the first rule matching a resource decides.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub enabled: bool,
    pub denial_mode: DenialMode,
    rules: Vec<PolicyRule>,
}

impl Policy {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            enabled: true,
            denial_mode: DenialMode::Fail,
            rules,
        }
    }

    /// A policy that never evaluates rules.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_denial_mode(mut self, mode: DenialMode) -> Self {
        self.denial_mode = mode;
        self
    }

    pub fn from_config(config: &PolicyConfig) -> Result<Self, AgentError> {
        let rules = config
            .rules
            .iter()
            .map(|rule| PolicyRule::new(rule.resource.clone(), rule.action, rule.condition.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            enabled: config.enabled,
            denial_mode: config.denial_mode,
            rules,
        })
    }

    pub fn from_toml_str(source: &str) -> Result<Self, AgentError> {
        let config: PolicyConfig = toml::from_str(source)
            .map_err(|e| AgentError::Configuration(format!("invalid policy: {e}")))?;
        Self::from_config(&config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn rule_for(&self, resource: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.matches(resource))
    }
}
