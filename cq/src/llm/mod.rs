//! Conversational model clients
//!
//! Both channels and the synthesis step talk to the model through the
//! [`LlmClient`] trait, so the coordinator runs the same against OpenAI, the
//! offline responder, or a scripted test double.

use std::sync::Arc;

use tracing::debug;

mod client;
mod error;
mod offline;
mod openai;
mod scripted;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use offline::{offline_client, respond as offline_respond};
pub use openai::OpenAIClient;
pub use scripted::{Responder, ScriptStep, ScriptedLlmClient};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, TokenUsage,
    ToolCall, ToolDefinition,
};

use crate::config::LlmConfig;

/// Create a model client based on the provider specified in config
///
/// Supports "openai" and "mock" (the offline rule-based responder).
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        "mock" => Ok(Arc::new(offline_client())),
        other => Err(LlmError::Config(format!(
            "Unknown LLM provider: '{}'. Supported: openai, mock",
            other
        ))),
    }
}
