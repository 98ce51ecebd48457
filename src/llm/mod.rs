//! LLM integration for requirement-vector scoring.
//!
//! Talks to an OpenAI-compatible chat API to score teaching resources
//! against the fixed category set.

mod client;

pub use client::{
    build_vector_prompt, render_rubric, ChatCompletion, ChatMessage, ChatRequest, ChatService,
    LlmClient, LlmConfig, LlmError, TokenUsage, MISSING_FIELD, RESOURCE_FIELDS,
};
