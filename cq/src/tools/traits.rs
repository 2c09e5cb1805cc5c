//! The `Tool` seam and what a tool call hands back

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::context::ToolContext;
use super::error::ToolError;
use crate::llm::ToolDefinition;

/// Something a channel's model may call
///
/// Tools never fail the turn: problems come back as an error result the model
/// can read and explain.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the call arguments
    fn input_schema(&self) -> Value;

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Payload returned to the model for one tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Compact JSON, the form every built-in tool answers in
    pub fn json<T: Serialize>(value: &T) -> Self {
        serde_json::to_string(value)
            .map(Self::success)
            .unwrap_or_else(|e| Self::error(format!("Failed to encode tool output: {}", e)))
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        Self::error(err.to_string())
    }
}
