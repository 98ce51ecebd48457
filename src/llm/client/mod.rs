//! Chat-completion client for requirement-vector scoring.
//!
//! Speaks the OpenAI-compatible `chat/completions` protocol (DeepSeek by
//! default). One request per call: no retries, no streaming.

mod config;
mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ConfigError;

pub use config::LlmConfig;
pub use prompts::{build_vector_prompt, render_rubric, MISSING_FIELD, RESOURCE_FIELDS};
use prompts::{CONNECTION_TEST_SYSTEM_PROMPT, CONNECTION_TEST_USER_PROMPT, SCORING_SYSTEM_PROMPT};

/// Errors that can occur talking to the chat service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to reach the service
    #[error("Connection error: {0}")]
    Connection(String),
    /// Service answered with a non-success status
    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },
    /// Response body was not a chat completion
    #[error("Parse error: {0}")]
    Parse(String),
    /// Completion carried no message content
    #[error("Empty response from model")]
    EmptyResponse,
}

/// One message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// A chat request, independent of model and endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Scoring request: fixed system instruction plus the batch prompt.
    pub fn scoring(prompt: String, config: &LlmConfig) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(SCORING_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Minimal request used to verify credentials and connectivity.
    pub fn connection_test() -> Self {
        Self {
            messages: vec![
                ChatMessage::system(CONNECTION_TEST_SYSTEM_PROMPT),
                ChatMessage::user(CONNECTION_TEST_USER_PROMPT),
            ],
            temperature: 0.3,
            max_tokens: 50,
        }
    }
}

/// Token accounting reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// The assistant's reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Anything that can answer a chat request.
///
/// The annotation pipeline only depends on this trait, so tests can drive it
/// with scripted replies.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError>;
}

/// HTTP client for an OpenAI-compatible chat API.
pub struct LlmClient {
    config: LlmConfig,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

impl LlmClient {
    /// Create a client. Fails before any network traffic if no credential is
    /// configured.
    pub fn new(config: LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?.to_string();

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn call_chat(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError> {
        let body = ApiRequest {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let url = self.config.chat_url();
        debug!("POST {} (model: {})", url, self.config.model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let parsed: ApiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        completion_from_response(parsed)
    }
}

#[async_trait]
impl ChatService for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError> {
        self.call_chat(request).await
    }
}

fn completion_from_response(resp: ApiResponse) -> Result<ChatCompletion, LlmError> {
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or(LlmError::EmptyResponse)?;

    Ok(ChatCompletion {
        content,
        usage: resp.usage,
    })
}
