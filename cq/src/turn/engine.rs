//! TurnEngine - runs one channel turn to its final assistant message

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coordination::AbortController;
use crate::llm::{CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, StopReason};
use crate::tools::{ToolContext, ToolExecutor, ToolResult};

const DEFAULT_MAX_TURNS: u32 = 8;
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("no final answer after {0} model calls")]
    MaxTurns(u32),
}

/// How a turn ended
#[derive(Debug)]
pub enum TurnOutcome {
    /// The model produced its final answer; `messages` is the full history
    /// including every tool round and the final assistant message
    Reply { text: String, messages: Vec<Message> },

    /// The abort checkpoint fired between tool rounds
    Aborted,

    Failed { error: TurnError, messages: Vec<Message> },
}

/// Loops model call → tool round until the model answers without tools
pub struct TurnEngine {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolExecutor>,
    system_prompt: String,
    max_turns: u32,
    max_tokens: u32,
}

impl TurnEngine {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolExecutor>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            tools,
            system_prompt: system_prompt.into(),
            max_turns: DEFAULT_MAX_TURNS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn tools(&self) -> &ToolExecutor {
        &self.tools
    }

    /// Run the turn on top of `messages`
    ///
    /// Text the model says alongside tool calls is emitted as intermediate
    /// text on the context's emitter. When `abort` is given it is checked
    /// after every tool round.
    pub async fn run(
        &self,
        mut messages: Vec<Message>,
        ctx: &ToolContext,
        abort: Option<&AbortController>,
    ) -> TurnOutcome {
        let tool_defs = self.tools.definitions();
        debug!(
            channel = %ctx.channel,
            history_len = messages.len(),
            tool_count = tool_defs.len(),
            max_turns = self.max_turns,
            "TurnEngine::run: called"
        );

        for turn in 1..=self.max_turns {
            let request = CompletionRequest {
                system_prompt: self.system_prompt.clone(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                max_tokens: self.max_tokens,
            };

            let response = match self.llm.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(channel = %ctx.channel, turn, error = %e, "TurnEngine::run: model call failed");
                    return TurnOutcome::Failed {
                        error: e.into(),
                        messages,
                    };
                }
            };
            debug!(channel = %ctx.channel, turn, stop_reason = ?response.stop_reason, tool_calls = response.tool_calls.len(), "TurnEngine::run: response received");

            messages.push(build_assistant_message(&response));

            match response.stop_reason {
                StopReason::ToolUse if !response.tool_calls.is_empty() => {
                    if let Some(text) = response.content.as_deref()
                        && let Some(events) = &ctx.events
                    {
                        events.text(text);
                    }

                    let names: Vec<&str> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
                    info!(channel = %ctx.channel, ?names, "Executing tool calls");
                    let results = self.tools.execute_all(&response.tool_calls, ctx).await;
                    messages.push(build_tool_result_message(&results));

                    if let Some(abort) = abort
                        && abort.check_abort().await
                    {
                        info!(channel = %ctx.channel, turn, "Turn aborted after tool round");
                        return TurnOutcome::Aborted;
                    }
                }
                StopReason::MaxTokens => {
                    debug!(channel = %ctx.channel, turn, "TurnEngine::run: output truncated, asking to continue");
                    messages.push(Message::user(
                        "Continue from where you left off. Your previous response was truncated.",
                    ));
                }
                StopReason::EndTurn | StopReason::StopSequence | StopReason::ToolUse => {
                    let text = response.content.unwrap_or_default();
                    debug!(channel = %ctx.channel, turn, reply_len = text.len(), "TurnEngine::run: final answer");
                    return TurnOutcome::Reply { text, messages };
                }
            }
        }

        warn!(channel = %ctx.channel, max_turns = self.max_turns, "Max turns reached without a final answer");
        TurnOutcome::Failed {
            error: TurnError::MaxTurns(self.max_turns),
            messages,
        }
    }
}

fn build_assistant_message(response: &CompletionResponse) -> Message {
    if response.tool_calls.is_empty() {
        return Message::assistant(response.content.clone().unwrap_or_default());
    }

    let mut blocks = Vec::new();
    if let Some(text) = &response.content {
        blocks.push(ContentBlock::text(text));
    }
    for call in &response.tool_calls {
        blocks.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        });
    }
    Message::assistant_blocks(blocks)
}

fn build_tool_result_message(results: &[(String, ToolResult)]) -> Message {
    let blocks = results
        .iter()
        .map(|(id, result)| ContentBlock::tool_result(id, &result.content, result.is_error))
        .collect();
    Message::user_blocks(blocks)
}
