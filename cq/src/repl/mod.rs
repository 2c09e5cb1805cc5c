//! Interactive chat over a [`Conversation`](crate::session::Conversation)

mod render;
mod session;

pub use render::{format_event, format_snapshot, spawn_printer};
pub use session::ReplSession;
