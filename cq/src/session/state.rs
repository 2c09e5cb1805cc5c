//! Per-thread conversation state

use coordstore::{StoreError, StoreRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::SessionContext;
use crate::coordination::RecordStore;
use crate::coordination::keys::thread_key;
use crate::llm::Message;

/// What a channel thread remembers between turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,

    /// The interim transcript as this thread last saw it
    #[serde(default)]
    pub interim_messages: Vec<Message>,
}

/// Saves and restores thread state under the session's `threads` namespace
#[derive(Clone)]
pub struct ThreadStore {
    records: RecordStore,
}

impl ThreadStore {
    pub fn new(store: StoreRef, session: &SessionContext) -> Result<Self, StoreError> {
        Ok(Self {
            records: RecordStore::new(store, session.threads_namespace()?),
        })
    }

    /// Saved state of the thread, empty for a new thread
    pub async fn load(&self, thread_id: &str) -> ConversationState {
        let state: ConversationState = self.records.get(&thread_key(thread_id)).await.unwrap_or_default();
        debug!(%thread_id, message_count = state.messages.len(), "ThreadStore::load: called");
        state
    }

    pub async fn save(&self, thread_id: &str, state: &ConversationState) {
        debug!(%thread_id, message_count = state.messages.len(), "ThreadStore::save: called");
        self.records.put(&thread_key(thread_id), state).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordstore::{CoordinationStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_save_and_load() {
        let store: StoreRef = Arc::new(MemoryStore::new());
        let session = SessionContext::new("demo_user", "tools_updates").unwrap();
        let threads = ThreadStore::new(store.clone(), &session).unwrap();

        assert_eq!(threads.load("t1").await, ConversationState::default());

        let state = ConversationState {
            messages: vec![Message::user("hi"), Message::assistant("hello")],
            interim_messages: vec![Message::assistant("a joke")],
        };
        threads.save("t1", &state).await;
        assert_eq!(threads.load("t1").await, state);

        // Thread state stays out of the coordination namespace
        assert!(store.search(&session.namespace).await.unwrap().is_empty());
    }
}
