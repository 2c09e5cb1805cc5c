//! The conversation surface and per-thread state

mod conversation;
mod state;

pub use conversation::{Conversation, ConversationSettings, SendOutcome, StatusSnapshot};
pub use state::{ConversationState, ThreadStore};
