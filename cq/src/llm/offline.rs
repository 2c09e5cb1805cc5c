//! Rule-based responder behind `provider: mock`
//!
//! Lets the REPL and the demo run end to end without network access. It reads
//! the tool list to tell the channels apart: the main channel can start long
//! operations, the secondary channel can only look things up, and synthesis
//! calls carry no tools at all.

use serde_json::{Value, json};
use uuid::Uuid;

use super::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmError, Message, MessageContent, ScriptedLlmClient, ToolCall,
};
use crate::prompts::{SYNTHESIS_INTERIM_MARKER, SYNTHESIS_RESULT_MARKER};
use crate::tools::builtin::{ACCOUNT_SUMMARY, CHECK_STATUS, LONG_OPERATION};

const MUTATING_WORDS: &[&str] = &["close", "cancel", "change", "upgrade", "switch", "start"];
const STATUS_WORDS: &[&str] = &["status", "progress", "how long", "done yet", "finished"];
const ACCOUNT_WORDS: &[&str] = &["data", "package", "plan", "balance", "bill"];

/// Client that answers every request with [`respond`]
pub fn offline_client() -> ScriptedLlmClient {
    ScriptedLlmClient::with_responder(respond)
}

pub fn respond(request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
    if request.tools.is_empty() {
        return Ok(synthesize(request));
    }
    let has_tool = |name: &str| request.tools.iter().any(|t| t.name == name);

    let Some(last) = request.messages.last() else {
        return Ok(CompletionResponse::text("Hi there! How can I help with your account today?"));
    };
    if last.is_tool_result() {
        return Ok(CompletionResponse::text(describe_results(&request.messages)));
    }

    let text = last.text().to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has_tool(LONG_OPERATION) && mentions(MUTATING_WORDS) {
        return Ok(call(LONG_OPERATION, json!({ "operation": operation_name(&text) })));
    }
    if has_tool(CHECK_STATUS) && mentions(STATUS_WORDS) {
        return Ok(call(CHECK_STATUS, json!({})));
    }
    if has_tool(ACCOUNT_SUMMARY) && mentions(ACCOUNT_WORDS) {
        return Ok(call(ACCOUNT_SUMMARY, json!({})));
    }

    let reply = if has_tool(LONG_OPERATION) {
        "I can close your contract, change your package, or look up your account. What would you like to do?"
    } else if mentions(MUTATING_WORDS) {
        "I can't start that while your current request is still going, but I'll be free again in a moment."
    } else {
        "Happy to keep you company while I finish up your request!"
    };
    Ok(CompletionResponse::text(reply))
}

fn call(name: &str, input: Value) -> CompletionResponse {
    let id = format!("call_{}", Uuid::now_v7().simple());
    CompletionResponse::tool_calls(vec![ToolCall::new(id, name, input)])
}

fn operation_name(text: &str) -> &'static str {
    if text.contains("contract") {
        "contract closure"
    } else if text.contains("package") || text.contains("plan") {
        "package change"
    } else {
        "account update"
    }
}

/// Turn the latest round of tool results into a spoken answer
fn describe_results(messages: &[Message]) -> String {
    let Some((results, rest)) = messages.split_last() else {
        return String::new();
    };
    let names: Vec<(String, String)> = rest
        .last()
        .map(|m| match &m.content {
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, .. } => Some((id.clone(), name.clone())),
                    _ => None,
                })
                .collect(),
            MessageContent::Text(_) => Vec::new(),
        })
        .unwrap_or_default();

    let mut sentences = Vec::new();
    if let MessageContent::Blocks(blocks) = &results.content {
        for block in blocks {
            let ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } = block
            else {
                continue;
            };
            if *is_error {
                sentences.push("Sorry, I couldn't get that done just now.".to_string());
                continue;
            }
            let name = names
                .iter()
                .find(|(id, _)| id == tool_use_id)
                .map(|(_, n)| n.as_str())
                .unwrap_or_default();
            let value: Value = serde_json::from_str(content).unwrap_or(Value::Null);
            sentences.push(describe_one(name, &value));
        }
    }
    sentences.join(" ")
}

fn describe_one(tool: &str, value: &Value) -> String {
    match tool {
        LONG_OPERATION => format!(
            "All done! Your {} went through successfully.",
            value["operation"].as_str().unwrap_or("request")
        ),
        CHECK_STATUS => match value["progress"].as_u64() {
            Some(pct) => format!("We're about {}% of the way there.", pct),
            None => "Nothing is in flight at the moment.".to_string(),
        },
        ACCOUNT_SUMMARY => {
            let allowance = value["data_allowance_gb"].as_f64().unwrap_or_default();
            let used = value["data_used_gb"].as_f64().unwrap_or_default();
            format!(
                "You're on the {} package with {:.1} GB of data left this month.",
                value["package"].as_str().unwrap_or("standard"),
                (allowance - used).max(0.0)
            )
        }
        _ => "Okay.".to_string(),
    }
}

fn synthesize(request: &CompletionRequest) -> CompletionResponse {
    let prompt = request.messages.iter().map(Message::text).collect::<Vec<_>>().join("\n");
    let result = prompt
        .split_once(SYNTHESIS_RESULT_MARKER)
        .map(|(_, tail)| tail)
        .and_then(|tail| tail.split_once(SYNTHESIS_INTERIM_MARKER).map(|(head, _)| head))
        .unwrap_or(&prompt)
        .trim();
    CompletionResponse::text(format!("Thanks for chatting while I worked on that. {}", result))
}
