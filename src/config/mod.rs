//! Provider credentials and endpoints (code > env).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use strum::IntoEnumIterator;
use tracing::debug;

use crate::models::ProviderKind;

/// API keys and base URLs per provider.
///
/// Cheap to clone; clones share the same maps.
#[derive(Clone, Default)]
pub struct AgentConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<String> = self
            .api_keys
            .read()
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("AgentConfig")
            .field("api_keys", &providers)
            .field("base_urls", &self.base_urls)
            .finish()
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (OPENAI_API_KEY, ANTHROPIC_API_KEY, etc.).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config = Self::new();
        for provider in ProviderKind::iter() {
            let key = provider
                .api_key_vars()
                .iter()
                .find_map(|var| lookup(var).filter(|v| !v.trim().is_empty()));
            if let Some(key) = key {
                debug!(provider = %provider, "API key found in environment");
                config.set_api_key(provider.as_str(), key);
            }
            if let Some(url) = lookup(provider.base_url_var()).filter(|v| !v.trim().is_empty()) {
                config.set_base_url(provider.as_str(), url);
            }
        }
        config
    }

    pub fn set_api_key(&self, provider: &str, key: impl Into<String>) {
        if let Ok(mut keys) = self.api_keys.write() {
            keys.insert(provider.to_string(), key.into());
        }
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.read().ok()?.get(provider).cloned()
    }

    pub fn has_api_key(&self, provider: &str) -> bool {
        self.get_api_key(provider).is_some()
    }

    pub fn set_base_url(&self, provider: &str, url: impl Into<String>) {
        if let Ok(mut urls) = self.base_urls.write() {
            urls.insert(provider.to_string(), url.into());
        }
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.read().ok()?.get(provider).cloned()
    }
}
