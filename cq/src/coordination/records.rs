//! Typed coordination records and their store access

use chrono::{DateTime, Utc};
use coordstore::{Item, Namespace, StoreRef};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use super::keys;
use crate::llm::Message;

/// The two logical conversation channels of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Main,
    Secondary,
}

impl Channel {
    /// Key of this channel's status record
    pub fn status_key(&self) -> &'static str {
        match self {
            Channel::Main => keys::MAIN_STATUS,
            Channel::Secondary => keys::SECONDARY_STATUS,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Main => write!(f, "main"),
            Channel::Secondary => write!(f, "secondary"),
        }
    }
}

/// Outcome state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Running => write!(f, "running"),
            OperationStatus::Completed => write!(f, "completed"),
            OperationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-channel status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub channel: Channel,
    pub processing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    #[serde(default)]
    pub aborted: bool,
    /// Main run that wrote the record, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusRecord {
    pub fn idle(channel: Channel) -> Self {
        Self {
            channel,
            processing: false,
            tool_name: None,
            progress: None,
            status: None,
            aborted: false,
            run_id: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Progress of the long-running tool, whichever channel started it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProgress {
    pub tool_name: String,
    pub progress: u8,
    pub status: OperationStatus,
    pub updated_at: DateTime<Utc>,
}

/// Advisory request for the secondary to stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortSignal {
    pub abort: bool,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Assistant messages the secondary produced while main was busy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterimTranscript {
    /// Main run the messages were exchanged during, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub messages: Vec<Message>,
}

impl InterimTranscript {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { run_id: None, messages }
    }

    /// True when the transcript was stamped by a main run other than `run_id`
    pub fn belongs_to_other_run(&self, run_id: &str) -> bool {
        self.run_id.as_deref().is_some_and(|ours| ours != run_id)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Written by main when its operation has finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionFlag {
    pub completed: bool,
    pub ready_for_new_operation: bool,
    pub timestamp: DateTime<Utc>,
}

/// Typed, failure-tolerant view of one namespace
///
/// Store errors and undecodable values are logged and reported as absent,
/// which every reader treats as the idle state.
#[derive(Clone)]
pub struct RecordStore {
    store: StoreRef,
    namespace: Namespace,
}

impl RecordStore {
    pub fn new(store: StoreRef, namespace: Namespace) -> Self {
        Self { store, namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Write a record; returns false if the store rejected it
    pub async fn put<T: Serialize>(&self, key: &str, record: &T) -> bool {
        let value = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => {
                warn!(namespace = %self.namespace, %key, error = %e, "RecordStore::put: encode failed");
                return false;
            }
        };
        match self.store.put(&self.namespace, key, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(namespace = %self.namespace, %key, error = %e, "RecordStore::put: store write failed");
                false
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let item = match self.store.get(&self.namespace, key).await {
            Ok(item) => item?,
            Err(e) => {
                warn!(namespace = %self.namespace, %key, error = %e, "RecordStore::get: store read failed");
                return None;
            }
        };
        match serde_json::from_value(item.value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(namespace = %self.namespace, %key, error = %e, "RecordStore::get: decode failed");
                None
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(&self.namespace, key).await {
            warn!(namespace = %self.namespace, %key, error = %e, "RecordStore::delete: store delete failed");
        }
    }

    /// All raw items in the namespace, oldest update first
    pub async fn scan(&self) -> Vec<Item> {
        match self.store.search(&self.namespace).await {
            Ok(items) => items,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "RecordStore::scan: store search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordstore::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn records() -> (StoreRef, RecordStore) {
        let store: StoreRef = Arc::new(MemoryStore::new());
        let ns = Namespace::new(["u", "f"]).unwrap();
        (store.clone(), RecordStore::new(store, ns))
    }

    #[test]
    fn test_status_record_omits_empty_fields() {
        let value = serde_json::to_value(StatusRecord::idle(Channel::Secondary)).unwrap();
        assert_eq!(value["channel"], "secondary");
        assert!(value.get("status").is_none());
        assert!(value.get("run_id").is_none());
    }

    #[test]
    fn test_unstamped_transcript_belongs_to_any_run() {
        let transcript: InterimTranscript = serde_json::from_value(json!({"messages": []})).unwrap();
        assert!(transcript.run_id.is_none());
        assert!(!transcript.belongs_to_other_run("run-b"));

        let stamped = InterimTranscript {
            run_id: Some("run-a".to_string()),
            ..InterimTranscript::default()
        };
        assert!(stamped.belongs_to_other_run("run-b"));
        assert!(!stamped.belongs_to_other_run("run-a"));
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_, records) = records();
        let flag = CompletionFlag {
            completed: true,
            ready_for_new_operation: false,
            timestamp: Utc::now(),
        };
        assert!(records.put(keys::MAIN_OPERATION_COMPLETE, &flag).await);
        let back: CompletionFlag = records.get(keys::MAIN_OPERATION_COMPLETE).await.unwrap();
        assert_eq!(back, flag);
        records.delete(keys::MAIN_OPERATION_COMPLETE).await;
        assert!(records.get::<CompletionFlag>(keys::MAIN_OPERATION_COMPLETE).await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_record_reads_as_absent() {
        let (store, records) = records();
        store
            .put(records.namespace(), keys::SECONDARY_ABORT, json!("garbage"))
            .await
            .unwrap();
        assert!(records.get::<AbortSignal>(keys::SECONDARY_ABORT).await.is_none());
    }
}
