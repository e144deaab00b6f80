//! Error types for testsmith.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Primary error type for all agent runtime operations.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error (status {status}): {body}")]
    Transport {
        status: u16,
        body: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Governance denied {tool} on resource '{resource}': {reason}")]
    GovernanceDenied {
        tool: String,
        resource: String,
        reason: String,
    },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse failure classification reported to the driving process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Protocol,
    GovernanceDenied,
    ToolExecution,
    MaxIterationsExceeded,
    Configuration,
}

impl AgentError {
    /// Build a transport error from a non-2xx response.
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status,
            body: body.into(),
            retry_after_ms: None,
        }
    }

    /// Build a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Build a tool failure.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error for the task outcome.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Transport { .. } | Self::Network(_) | Self::Timeout(_) | Self::Authentication(_) => {
                FailureKind::Transport
            }
            Self::Protocol(_) | Self::Serialization(_) => FailureKind::Protocol,
            Self::GovernanceDenied { .. } => FailureKind::GovernanceDenied,
            Self::ToolExecution { .. } | Self::InvalidArgument(_) | Self::Io(_) => {
                FailureKind::ToolExecution
            }
            Self::Configuration(_) => FailureKind::Configuration,
        }
    }

    /// Whether a fresh attempt of the whole run may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Network(_) | Self::Timeout(_) | Self::Protocol(_) => true,
            _ => false,
        }
    }

    pub fn is_governance_denial(&self) -> bool {
        matches!(self, Self::GovernanceDenied { .. })
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AgentError>;
