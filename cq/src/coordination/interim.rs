//! Access to the interim transcript

use tracing::debug;

use super::keys;
use super::records::{InterimTranscript, RecordStore};
use crate::llm::Message;

/// The secondary appends and saves; the main runner reads once and deletes
#[derive(Clone)]
pub struct InterimLog {
    records: RecordStore,
}

impl InterimLog {
    pub fn new(records: RecordStore) -> Self {
        Self { records }
    }

    /// Current transcript, empty when none is stored
    pub async fn load(&self) -> InterimTranscript {
        self.records
            .get(keys::SECONDARY_INTERIM_MESSAGES)
            .await
            .unwrap_or_default()
    }

    /// Transcript with `message` appended, starting over when `reset` is set
    ///
    /// `run_id` is the main run the message belongs to. A stored transcript
    /// stamped by a different run is dropped rather than appended to.
    /// Nothing is written; the caller saves once it knows it may publish.
    pub async fn appended(&self, message: Message, reset: bool, run_id: Option<&str>) -> InterimTranscript {
        let mut transcript = if reset {
            debug!(namespace = %self.records.namespace(), "InterimLog::appended: resetting transcript");
            InterimTranscript::default()
        } else {
            let stored = self.load().await;
            match run_id {
                Some(run_id) if stored.belongs_to_other_run(run_id) => {
                    debug!(%run_id, stale = ?stored.run_id, "InterimLog::appended: dropping transcript of another run");
                    InterimTranscript::default()
                }
                _ => stored,
            }
        };
        if let Some(run_id) = run_id {
            transcript.run_id = Some(run_id.to_string());
        }
        transcript.messages.push(message);
        transcript
    }

    pub async fn save(&self, transcript: &InterimTranscript) {
        debug!(message_count = %transcript.messages.len(), "InterimLog::save: called");
        self.records.put(keys::SECONDARY_INTERIM_MESSAGES, transcript).await;
    }

    pub async fn clear(&self) {
        self.records.delete(keys::SECONDARY_INTERIM_MESSAGES).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordstore::{MemoryStore, Namespace, StoreRef};
    use std::sync::Arc;

    fn log() -> InterimLog {
        let store: StoreRef = Arc::new(MemoryStore::new());
        InterimLog::new(RecordStore::new(store, Namespace::new(["u", "f"]).unwrap()))
    }

    #[tokio::test]
    async fn test_append_accumulates() {
        let log = log();
        let first = log.appended(Message::assistant("one"), false, None).await;
        log.save(&first).await;
        let second = log.appended(Message::assistant("two"), false, None).await;
        log.save(&second).await;

        let texts: Vec<String> = log.load().await.messages.iter().map(Message::text).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_reset_drops_earlier_messages() {
        let log = log();
        let stale = log.appended(Message::assistant("stale"), false, None).await;
        log.save(&stale).await;

        let fresh = log.appended(Message::assistant("fresh"), true, None).await;
        log.save(&fresh).await;

        let texts: Vec<String> = log.load().await.messages.iter().map(Message::text).collect();
        assert_eq!(texts, vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_appended_does_not_write() {
        let log = log();
        let _ = log.appended(Message::assistant("draft"), false, None).await;
        assert!(log.load().await.is_empty());
        log.clear().await;
    }

    #[tokio::test]
    async fn test_transcript_of_another_run_is_dropped() {
        let log = log();
        let earlier = log.appended(Message::assistant("from run a"), false, Some("run-a")).await;
        log.save(&earlier).await;

        let same = log.appended(Message::assistant("also run a"), false, Some("run-a")).await;
        assert_eq!(same.messages.len(), 2);

        let next = log.appended(Message::assistant("from run b"), false, Some("run-b")).await;
        assert_eq!(next.run_id.as_deref(), Some("run-b"));
        let texts: Vec<String> = next.messages.iter().map(Message::text).collect();
        assert_eq!(texts, vec!["from run b"]);
    }
}
