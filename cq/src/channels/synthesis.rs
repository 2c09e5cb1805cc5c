//! Folding the interim conversation into the main channel's final reply

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::PromptLoader;

/// Messages mentioning any of these only report progress and are not worth
/// folding into the final reply
pub const PROGRESS_KEYWORDS: [&str; 5] = ["processing", "complete", "running", "percent", "status"];

const SYNTHESIS_MAX_TOKENS: u32 = 256;

/// True when the message says something beyond a progress report
pub fn is_meaningful(message: &Message) -> bool {
    let text = message.text().to_lowercase();
    !text.trim().is_empty() && !PROGRESS_KEYWORDS.iter().any(|k| text.contains(k))
}

pub fn meaningful_messages(messages: &[Message]) -> Vec<Message> {
    messages.iter().filter(|m| is_meaningful(m)).cloned().collect()
}

/// One `"<role>: <text>"` line per message
pub fn render_interim(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.text()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Makes the single model call that merges a result with the interim chat
pub struct SynthesisEngine {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl SynthesisEngine {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self {
            llm,
            prompts,
            max_tokens: SYNTHESIS_MAX_TOKENS,
        }
    }

    /// Brief reply acknowledging the interim chat, then presenting the result
    ///
    /// Falls back to `result_text` when the prompt cannot be rendered, the
    /// model fails or the model says nothing.
    pub async fn synthesize(&self, result_text: &str, interim_conversation: &str) -> String {
        debug!(
            result_len = result_text.len(),
            interim_len = interim_conversation.len(),
            "SynthesisEngine::synthesize: called"
        );
        let prompt = match self.prompts.render_synthesis(result_text, interim_conversation) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Synthesis prompt failed to render, keeping the result");
                return result_text.to_string();
            }
        };
        let system_prompt = match self.prompts.synthesis_system_prompt() {
            Ok(system_prompt) => system_prompt,
            Err(e) => {
                warn!(error = %e, "Synthesis system prompt missing, keeping the result");
                return result_text.to_string();
            }
        };

        let request = CompletionRequest {
            system_prompt,
            messages: vec![Message::user(prompt)],
            tools: Vec::new(),
            max_tokens: self.max_tokens,
        };
        match self.llm.complete(request).await {
            Ok(response) => match response.content.map(|c| c.trim().to_string()) {
                Some(text) if !text.is_empty() => {
                    info!(reply_len = text.len(), "Synthesized final reply");
                    text
                }
                _ => {
                    warn!("Synthesis returned no text, keeping the result");
                    result_text.to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "Synthesis failed, keeping the result");
                result_text.to_string()
            }
        }
    }
}
