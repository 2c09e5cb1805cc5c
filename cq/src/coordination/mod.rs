//! Store-backed coordination between the main and secondary channels
//!
//! The channels share nothing but a namespace in a [`coordstore`] store.
//! Each record key has a single writer:
//!
//! | key | writer | readers |
//! |---|---|---|
//! | `main_status` | main runner, long-running tools | router |
//! | `secondary_status` | secondary runner (main deletes it at cleanup) | main runner |
//! | `secondary_abort` | main runner | secondary runner |
//! | `secondary_interim_messages` | secondary runner | main runner (read once, then deleted) |
//! | `main_operation_complete` | main runner | router |
//! | `working-tool-status-update` | long-running tools | `check_status`, router fallback |

mod abort;
mod interim;
pub mod keys;
mod records;
mod status;

pub use abort::{AbortController, MAIN_THREAD_TIMEOUT};
pub use interim::InterimLog;
pub use records::{
    AbortSignal, Channel, CompletionFlag, InterimTranscript, OperationStatus, RecordStore, StatusRecord, ToolProgress,
};
pub use status::StatusTracker;

use coordstore::{Namespace, StoreRef};

/// The three coordination handles for one namespace
#[derive(Clone)]
pub struct Coordination {
    pub status: StatusTracker,
    pub abort: AbortController,
    pub interim: InterimLog,
}

impl Coordination {
    pub fn new(store: StoreRef, namespace: Namespace) -> Self {
        let records = RecordStore::new(store, namespace);
        Self {
            status: StatusTracker::new(records.clone()),
            abort: AbortController::new(records.clone()),
            interim: InterimLog::new(records),
        }
    }
}
