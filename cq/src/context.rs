//! Per-conversation identity passed to runners and tools

use coordstore::{Namespace, StoreError, sanitize_segment};
use uuid::Uuid;

/// Sub-namespace holding saved channel conversations
const THREADS_SEGMENT: &str = "threads";

/// Who is talking and where their coordination records live
///
/// Every runner and tool receives this explicitly; there is no process-wide
/// "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub user_id: String,
    pub namespace: Namespace,
}

impl SessionContext {
    /// Build a context for `user_id`, scoped to `(user, feature)`
    ///
    /// The user id is sanitized into a namespace segment; the original value is
    /// kept for display and tool lookups.
    pub fn new(user_id: &str, feature: &str) -> Result<Self, StoreError> {
        let namespace = Namespace::new([sanitize_segment(user_id), sanitize_segment(feature)])?;
        Ok(Self {
            session_id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            namespace,
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Namespace for per-thread conversation state
    pub fn threads_namespace(&self) -> Result<Namespace, StoreError> {
        self.namespace.child(THREADS_SEGMENT)
    }
}
