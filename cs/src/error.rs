//! Store error types

use thiserror::Error;

/// Errors that can occur while talking to a coordination store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid namespace '{namespace}': {reason}")]
    InvalidNamespace { namespace: String, reason: String },

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Check if retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_message() {
        let err = StoreError::InvalidKey {
            key: "a/b".to_string(),
            reason: "contains '/'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("a/b"));
        assert!(msg.contains("contains '/'"));
    }

    #[test]
    fn test_is_transient() {
        assert!(StoreError::Unavailable("down".to_string()).is_transient());
        assert!(StoreError::Io(std::io::Error::other("disk")).is_transient());
        assert!(
            !StoreError::InvalidKey {
                key: String::new(),
                reason: "empty".to_string()
            }
            .is_transient()
        );
    }
}
