//! ToolContext - execution context for tools

use tracing::debug;

use crate::context::SessionContext;
use crate::coordination::{Channel, StatusTracker};
use crate::events::EventEmitter;

/// What a tool can see and touch during one call
///
/// The status tracker is bound to the calling runner, so a long-running tool
/// started by a main run stamps that run's id into the main status.
#[derive(Clone)]
pub struct ToolContext {
    pub session: SessionContext,

    /// Channel whose runner is executing the tool
    pub channel: Channel,

    pub status: StatusTracker,

    /// Where custom progress notices go; `None` when nobody listens
    pub events: Option<EventEmitter>,
}

impl ToolContext {
    pub fn new(session: SessionContext, channel: Channel, status: StatusTracker) -> Self {
        debug!(session_id = %session.session_id, %channel, "ToolContext::new: called");
        Self {
            session,
            channel,
            status,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    /// Send a progress notice to the client, if anyone is listening
    pub fn notify(&self, text: &str) {
        if let Some(events) = &self.events {
            events.progress(text);
        }
    }
}
