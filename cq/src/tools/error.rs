//! Tool error types

use thiserror::Error;

/// Errors raised inside tools, reported back to the model as error results
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    UnknownTool { name: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No account found for user {user_id}")]
    AccountNotFound { user_id: String },

    #[error("Failed to load account fixture {path}: {reason}")]
    Fixture { path: String, reason: String },
}
