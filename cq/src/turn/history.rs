//! History trimming and sanitising before a model call

use std::collections::HashSet;

use tracing::debug;

use crate::llm::{Message, Role};

/// Keep the last `max_messages` messages
pub fn trim(mut messages: Vec<Message>, max_messages: usize) -> Vec<Message> {
    if messages.len() > max_messages {
        let excess = messages.len() - max_messages;
        debug!(%excess, %max_messages, "history::trim: dropping oldest messages");
        messages.drain(..excess);
    }
    messages
}

/// Drop tool results that do not answer the assistant message before them
///
/// A tool-result message is kept only when the closest preceding non-result
/// message is an assistant message requesting every id it answers. The output
/// never starts with a tool result.
pub fn sanitize(messages: Vec<Message>) -> Vec<Message> {
    let mut sanitized = Vec::with_capacity(messages.len());
    let mut pending: Option<HashSet<String>> = None;

    for message in messages {
        if message.is_tool_result() {
            let answered = pending
                .as_ref()
                .is_some_and(|ids| message.tool_result_ids().iter().all(|id| ids.contains(*id)));
            if answered {
                sanitized.push(message);
            } else {
                debug!("history::sanitize: dropping orphan tool result");
            }
            continue;
        }

        pending = match message.role {
            Role::Assistant => {
                let ids: HashSet<String> = message.tool_use_ids().into_iter().map(String::from).collect();
                (!ids.is_empty()).then_some(ids)
            }
            Role::User => None,
        };
        sanitized.push(message);
    }
    sanitized
}

/// Trim then sanitise
pub fn prepare(messages: Vec<Message>, max_messages: usize) -> Vec<Message> {
    sanitize(trim(messages, max_messages))
}
