//! OpenAI Chat Completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, MessageContent, StopReason,
    TokenUsage, ToolCall,
};
use crate::config::LlmConfig;

const MAX_ATTEMPTS: u32 = 4;
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Longest provider-requested wait honoured before giving up
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);

pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    /// Fails when the API key environment variable is unset
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "OpenAIClient::from_config: called");
        let api_key = config.api_key().map_err(|e| LlmError::Config(e.to_string()))?;
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    fn chat_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        let limit = request.max_tokens.min(self.max_tokens);
        // Reasoning models reject max_tokens
        let reasoning = ["gpt-5", "o1", "o3", "o4"].iter().any(|p| self.model.starts_with(p));

        let mut messages = vec![json!({"role": "system", "content": request.system_prompt})];
        messages.extend(wire_messages(&request.messages));

        let tools: Vec<Value> = request.tools.iter().map(|t| t.to_openai_schema()).collect();
        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: (!reasoning).then_some(limit),
            max_completion_tokens: reasoning.then_some(limit),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools,
        }
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Network(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(BASE_BACKOFF);
            return Err(LlmError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes)?;
        parsed.into_completion()
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, messages = request.messages.len(), tools = request.tools.len(), "OpenAIClient::complete: called");
        let body = self.chat_request(&request);

        let mut attempt = 1;
        loop {
            let err = match self.send_once(&body).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            if attempt >= MAX_ATTEMPTS || !err.is_retryable() {
                return Err(err);
            }
            let wait = match err.retry_after() {
                Some(requested) if requested > MAX_RETRY_AFTER => return Err(err),
                Some(requested) => requested,
                None => BASE_BACKOFF * 2u32.pow(attempt - 1),
            };
            warn!(attempt, ?wait, error = %err, "Model call failed, retrying");
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

/// Flatten internal messages into chat-completions messages
///
/// Each tool result becomes its own `tool` message.
fn wire_messages(messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let blocks = match &message.content {
            MessageContent::Text(text) => {
                out.push(json!({"role": message.role.to_string(), "content": text}));
                continue;
            }
            MessageContent::Blocks(blocks) => blocks,
        };

        let mut text = String::new();
        let mut calls = Vec::new();
        for block in blocks {
            match block {
                ContentBlock::Text { text: t } => text.push_str(t),
                ContentBlock::ToolUse { id, name, input } => calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": input.to_string()},
                })),
                ContentBlock::ToolResult {
                    tool_use_id, content, ..
                } => out.push(json!({"role": "tool", "tool_call_id": tool_use_id, "content": content})),
            }
        }

        if !calls.is_empty() {
            let mut assistant = json!({"role": "assistant", "tool_calls": calls});
            if !text.is_empty() {
                assistant["content"] = json!(text);
            }
            out.push(assistant);
        } else if !message.is_tool_result() {
            out.push(json!({"role": message.role.to_string(), "content": text}));
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: ChatUsage,
}

impl ChatResponse {
    fn into_completion(self) -> Result<CompletionResponse, LlmError> {
        let usage = TokenUsage {
            input_tokens: self.usage.prompt_tokens,
            output_tokens: self.usage.completion_tokens,
        };
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("response has no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                // Arguments the model mangled reach the tool as an empty object
                input: serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({})),
                id: call.id,
                name: call.function.name,
            })
            .collect();

        Ok(CompletionResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            stop_reason: StopReason::from_finish_reason(choice.finish_reason.as_deref()),
            usage,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolDefinition;

    fn client(model: &str, max_tokens: u32) -> OpenAIClient {
        OpenAIClient {
            model: model.to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.openai.com".to_string(),
            http: Client::new(),
            max_tokens,
            timeout: Duration::from_secs(30),
        }
    }

    fn request(tools: Vec<ToolDefinition>, max_tokens: u32) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are a telecom assistant".to_string(),
            messages: vec![Message::user("How much data do I have left?")],
            tools,
            max_tokens,
        }
    }

    #[test]
    fn test_secondary_request_body() {
        let client = client("gpt-4o-mini", 8192);
        let req = request(
            vec![ToolDefinition::new("check_status", "x", json!({"type": "object"}))],
            1000,
        );
        let body = serde_json::to_value(client.chat_request(&req)).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 1000);
        assert!(body.get("max_completion_tokens").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn test_synthesis_request_has_no_tools_and_is_capped() {
        let client = client("o3-mini", 256);
        let req = request(Vec::new(), 5000);
        let body = serde_json::to_value(client.chat_request(&req)).unwrap();

        assert_eq!(body["max_completion_tokens"], 256);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_tool_round_is_flattened() {
        let messages = vec![
            Message::assistant_blocks(vec![
                ContentBlock::text("One moment."),
                ContentBlock::ToolUse {
                    id: "c1".to_string(),
                    name: "check_status".to_string(),
                    input: json!({}),
                },
            ]),
            Message::user_blocks(vec![
                ContentBlock::tool_result("c1", "{}", false),
                ContentBlock::tool_result("c2", "{}", false),
            ]),
        ];
        let wire = wire_messages(&messages);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0]["content"], "One moment.");
        assert_eq!(wire[0]["tool_calls"][0]["function"]["name"], "check_status");
        assert_eq!(wire[1]["role"], "tool");
        assert_eq!(wire[2]["tool_call_id"], "c2");
    }

    #[test]
    fn test_long_operation_call_is_parsed() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "long_operation", "arguments": "{\"operation\":\"contract closure\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let response = serde_json::from_value::<ChatResponse>(raw).unwrap().into_completion().unwrap();
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert!(response.content.is_none());
        assert_eq!(response.tool_calls[0].input["operation"], "contract closure");
        assert_eq!(response.usage.input_tokens, 12);
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let raw = json!({"choices": []});
        let err = serde_json::from_value::<ChatResponse>(raw).unwrap().into_completion().unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }
}
