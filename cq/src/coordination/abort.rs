//! Cooperative abort of the secondary channel

use chrono::Utc;
use tracing::{debug, info};

use super::keys;
use super::records::{AbortSignal, RecordStore};

/// Reason written when main gives up waiting for the secondary
pub const MAIN_THREAD_TIMEOUT: &str = "main_thread_timeout";

/// Writes and observes the abort signal
///
/// Only the main runner calls [`request_abort`](Self::request_abort). The
/// secondary polls [`check_abort`](Self::check_abort) at its checkpoints and
/// is never interrupted mid-step.
#[derive(Clone)]
pub struct AbortController {
    records: RecordStore,
}

impl AbortController {
    pub fn new(records: RecordStore) -> Self {
        Self { records }
    }

    pub async fn request_abort(&self, reason: &str) {
        info!(namespace = %self.records.namespace(), %reason, "Requesting secondary abort");
        let signal = AbortSignal {
            abort: true,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        };
        self.records.put(keys::SECONDARY_ABORT, &signal).await;
    }

    /// True when an abort has been requested and not yet consumed
    pub async fn check_abort(&self) -> bool {
        let requested = self.current().await.is_some_and(|s| s.abort);
        if requested {
            debug!(namespace = %self.records.namespace(), "AbortController::check_abort: abort requested");
        }
        requested
    }

    pub async fn current(&self) -> Option<AbortSignal> {
        self.records.get(keys::SECONDARY_ABORT).await
    }

    /// Delete the signal; idempotent
    pub async fn clear(&self) {
        self.records.delete(keys::SECONDARY_ABORT).await;
    }
}
