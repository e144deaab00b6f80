//! Model selection: which protocol adapter and which model id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::AgentError;

/// Protocol family behind a model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    #[strum(to_string = "openai")]
    OpenAi,
    #[strum(to_string = "anthropic", serialize = "claude")]
    Anthropic,
    #[strum(to_string = "google", serialize = "gemini")]
    Google,
}

impl ProviderKind {
    /// Canonical key used for config lookups.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    /// Environment variables holding this provider's API key, in priority order.
    pub const fn api_key_vars(self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        }
    }

    pub const fn base_url_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_BASE_URL",
            Self::Anthropic => "ANTHROPIC_BASE_URL",
            Self::Google => "GOOGLE_BASE_URL",
        }
    }
}

/// A `provider:model` selector, e.g. `anthropic:claude-sonnet-4-5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
}

impl ModelSpec {
    pub fn new(provider: ProviderKind, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, AgentError> {
        let (provider, model_id) = s.trim().split_once(':').ok_or_else(|| {
            AgentError::InvalidArgument(format!("Invalid model selector '{s}': expected 'provider:model_id'"))
        })?;
        let provider = ProviderKind::from_str(provider.trim())
            .map_err(|_| AgentError::InvalidArgument(format!("Unknown provider '{provider}' in '{s}'")))?;
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(AgentError::InvalidArgument(format!("Missing model id in '{s}'")));
        }
        Ok(Self::new(provider, model_id))
    }
}

impl FromStr for ModelSpec {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider.as_str(), self.model_id)
    }
}
