//! Channel status, tool progress and completion records

use chrono::Utc;
use tracing::{debug, warn};

use super::keys;
use super::records::{Channel, CompletionFlag, OperationStatus, RecordStore, StatusRecord, ToolProgress};

/// Reads and writes the status records of one namespace
///
/// A tracker carrying a run id stamps it into every main status it writes and
/// refuses to reset a main status stamped by a different run.
#[derive(Clone)]
pub struct StatusTracker {
    records: RecordStore,
    run_id: Option<String>,
}

impl StatusTracker {
    pub fn new(records: RecordStore) -> Self {
        Self { records, run_id: None }
    }

    /// Copy of this tracker bound to one main run
    pub fn for_run(&self, run_id: impl Into<String>) -> Self {
        Self {
            records: self.records.clone(),
            run_id: Some(run_id.into()),
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    fn stamp(&self, channel: Channel) -> Option<String> {
        match channel {
            Channel::Main => self.run_id.clone(),
            Channel::Secondary => None,
        }
    }

    /// Upsert the channel status for a tool at `progress` percent
    pub async fn write_status(&self, channel: Channel, tool_name: &str, progress: u8, status: OperationStatus) {
        debug!(namespace = %self.records.namespace(), %channel, %tool_name, %progress, %status, "StatusTracker::write_status: called");
        let previous = self.read_status(channel).await;
        let now = Utc::now();
        let record = StatusRecord {
            channel,
            processing: status == OperationStatus::Running,
            tool_name: Some(tool_name.to_string()),
            progress: Some(progress.min(100)),
            status: Some(status),
            aborted: false,
            run_id: self.stamp(channel),
            started_at: previous.and_then(|p| p.started_at).or(Some(now)),
            completed_at: (status != OperationStatus::Running).then_some(now),
        };
        self.records.put(channel.status_key(), &record).await;
    }

    /// Mark the channel busy before any work starts
    pub async fn mark_started(&self, channel: Channel) {
        debug!(namespace = %self.records.namespace(), %channel, "StatusTracker::mark_started: called");
        let record = StatusRecord {
            processing: true,
            run_id: self.stamp(channel),
            started_at: Some(Utc::now()),
            ..StatusRecord::idle(channel)
        };
        self.records.put(channel.status_key(), &record).await;
    }

    /// Mark the channel idle, keeping what the last status said about its tool
    pub async fn mark_finished(&self, channel: Channel, aborted: bool) {
        debug!(namespace = %self.records.namespace(), %channel, %aborted, "StatusTracker::mark_finished: called");
        let previous = self.read_status(channel).await.unwrap_or_else(|| StatusRecord::idle(channel));
        let record = StatusRecord {
            processing: false,
            aborted,
            run_id: self.stamp(channel).or(previous.run_id.clone()),
            completed_at: Some(Utc::now()),
            ..previous
        };
        self.records.put(channel.status_key(), &record).await;
    }

    pub async fn read_status(&self, channel: Channel) -> Option<StatusRecord> {
        self.records.get(channel.status_key()).await
    }

    /// True only when a status record says the channel is working
    pub async fn is_processing(&self, channel: Channel) -> bool {
        self.read_status(channel).await.is_some_and(|s| s.processing)
    }

    /// Delete the channel status; idempotent
    ///
    /// For the main channel, a tracker bound to a run leaves alone a record
    /// written by another run.
    pub async fn reset_status(&self, channel: Channel) {
        debug!(namespace = %self.records.namespace(), %channel, run_id = ?self.run_id, "StatusTracker::reset_status: called");
        if channel == Channel::Main
            && let Some(ours) = &self.run_id
            && let Some(current) = self.read_status(channel).await
            && let Some(theirs) = &current.run_id
            && theirs != ours
        {
            warn!(%ours, %theirs, "StatusTracker::reset_status: main status belongs to another run, leaving it");
            return;
        }
        self.records.delete(channel.status_key()).await;
    }

    /// Record progress of the long-running tool
    pub async fn report_progress(&self, tool_name: &str, progress: u8, status: OperationStatus) {
        let record = ToolProgress {
            tool_name: tool_name.to_string(),
            progress: progress.min(100),
            status,
            updated_at: Utc::now(),
        };
        self.records.put(keys::TOOL_PROGRESS, &record).await;
    }

    pub async fn read_progress(&self) -> Option<ToolProgress> {
        self.records.get(keys::TOOL_PROGRESS).await
    }

    pub async fn clear_progress(&self) {
        self.records.delete(keys::TOOL_PROGRESS).await;
    }

    pub async fn write_completion(&self, ready_for_new_operation: bool) {
        debug!(%ready_for_new_operation, "StatusTracker::write_completion: called");
        let flag = CompletionFlag {
            completed: true,
            ready_for_new_operation,
            timestamp: Utc::now(),
        };
        self.records.put(keys::MAIN_OPERATION_COMPLETE, &flag).await;
    }

    pub async fn read_completion(&self) -> Option<CompletionFlag> {
        self.records.get(keys::MAIN_OPERATION_COMPLETE).await
    }

    pub async fn clear_completion(&self) {
        self.records.delete(keys::MAIN_OPERATION_COMPLETE).await;
    }

    /// Raw view of the namespace for fallback scans
    pub fn records(&self) -> &RecordStore {
        &self.records
    }
}
