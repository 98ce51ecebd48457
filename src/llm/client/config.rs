//! Chat service configuration.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Configuration for the chat-completion client.
///
/// The client never reads the environment itself: callers build this once at
/// startup (file, then [`LlmConfig::with_env_overrides`], then CLI flags) and
/// hand it to [`super::LlmClient::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model id sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature; kept high so rows in a batch get distinct scores
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request timeout. `None` waits for as long as the service takes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_endpoint() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.8
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: None,
        }
    }
}

impl LlmConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `DEEPSEEK_API_KEY`: API credential
    /// - `DEEPSEEK_ENDPOINT`: API base URL
    /// - `DEEPSEEK_MODEL`: Model name
    /// - `LLM_MAX_TOKENS`: Maximum tokens in response
    /// - `LLM_TEMPERATURE`: Generation temperature (0.0-2.0)
    /// - `LLM_TIMEOUT_SECS`: Request timeout in seconds
    ///
    /// Unparseable numeric values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source (the environment in
    /// production, a map in tests).
    pub fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = var("DEEPSEEK_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.api_key = Some(val);
        }
        if let Some(val) = var("DEEPSEEK_ENDPOINT") {
            self.endpoint = val;
        }
        if let Some(val) = var("DEEPSEEK_MODEL") {
            self.model = val;
        }
        if let Some(n) = var("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.max_tokens = n;
        }
        if let Some(t) = var("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.temperature = t;
        }
        if let Some(n) = var("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout_secs = Some(n);
        }
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// The credential, or a configuration error if none was supplied.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Credential shortened for display, e.g. `sk-1234567...wxyz`.
    pub fn masked_api_key(&self) -> Option<String> {
        let key = self.api_key.as_deref()?;
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 14 {
            return Some("*".repeat(chars.len()));
        }
        let head: String = chars[..10].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        Some(format!("{}...{}", head, tail))
    }

    /// Full URL of the chat-completions endpoint.
    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// Hint shown when the service cannot be reached.
    pub fn availability_hint(&self) -> String {
        if self.api_key.is_none() {
            "API key not set. Set DEEPSEEK_API_KEY (or add it to .env) or pass --api-key"
                .to_string()
        } else {
            format!("Chat API not available at {}", self.endpoint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.max_tokens, 4000);
        assert!((config.temperature - 0.8).abs() < f32::EPSILON);
        assert!(config.api_key.is_none());
        assert_eq!(config.chat_url(), "https://api.deepseek.com/chat/completions");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("DEEPSEEK_ENDPOINT", "http://localhost:8080/v1/"),
            ("LLM_MAX_TOKENS", "not-a-number"),
            ("LLM_TEMPERATURE", "0.2"),
        ]
        .into_iter()
        .collect();

        let config =
            LlmConfig::default().with_overrides_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.chat_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(config.max_tokens, 4000);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_require_api_key() {
        assert!(matches!(
            LlmConfig::default().require_api_key(),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(matches!(
            LlmConfig::default().with_api_key("  ").require_api_key(),
            Err(ConfigError::MissingApiKey)
        ));
        assert_eq!(
            LlmConfig::default().with_api_key("sk-x").require_api_key().unwrap(),
            "sk-x"
        );
    }

    #[test]
    fn test_builders_override_file_values() {
        let config = LlmConfig::default()
            .with_endpoint("http://localhost:8080/v1/")
            .with_model("deepseek-reasoner");
        assert_eq!(config.model, "deepseek-reasoner");
        assert_eq!(config.chat_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_masked_api_key() {
        let config = LlmConfig::default().with_api_key("sk-0123456789abcdefwxyz");
        assert_eq!(config.masked_api_key().unwrap(), "sk-0123456...wxyz");

        let short = LlmConfig::default().with_api_key("short");
        assert_eq!(short.masked_api_key().unwrap(), "*****");
    }
}
