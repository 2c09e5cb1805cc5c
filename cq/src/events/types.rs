//! Reply event types

use serde::{Deserialize, Serialize};

use crate::channels::MainPhase;
use crate::coordination::Channel;

/// Everything the conversation surface tells its client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyEvent {
    /// Text the model said while still working (before tool calls)
    Text { channel: Channel, text: String },

    /// Custom progress notice from a long-running tool
    Progress { text: String },

    /// The finished reply of one channel turn
    Final { channel: Channel, text: String },

    /// Main runner state change
    Phase { phase: MainPhase },

    Error { message: String },
}

impl ReplyEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ReplyEvent::Text { .. } => "text",
            ReplyEvent::Progress { .. } => "progress",
            ReplyEvent::Final { .. } => "final",
            ReplyEvent::Phase { .. } => "phase",
            ReplyEvent::Error { .. } => "error",
        }
    }

    /// Spoken text carried by the event, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            ReplyEvent::Text { text, .. } | ReplyEvent::Progress { text } | ReplyEvent::Final { text, .. } => {
                Some(text)
            }
            ReplyEvent::Phase { .. } | ReplyEvent::Error { .. } => None,
        }
    }

    pub fn channel(&self) -> Option<Channel> {
        match self {
            ReplyEvent::Text { channel, .. } | ReplyEvent::Final { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let event = ReplyEvent::Final {
            channel: Channel::Secondary,
            text: "Sure!".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "final");
        assert_eq!(value["channel"], "secondary");
        assert_eq!(event.text(), Some("Sure!"));
    }

    #[test]
    fn test_phase_has_no_text() {
        let event = ReplyEvent::Phase {
            phase: MainPhase::AwaitingDrain,
        };
        assert_eq!(event.event_type(), "phase");
        assert!(event.text().is_none());
        assert!(event.channel().is_none());
    }
}
