//! Model call failures
//!
//! None of these reach the user. The channel runners turn every one of them
//! into the fallback apology; the OpenAI client retries the transient ones.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited by provider, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed completion: {0}")]
    Malformed(String),

    #[error("Could not decode completion: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Model client misconfigured: {0}")]
    Config(String),

    /// A scripted client was told to fail, or ran out of answers
    #[error("Scripted failure: {0}")]
    Scripted(String),
}

impl LlmError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::Http { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }

    /// Provider-requested wait before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
