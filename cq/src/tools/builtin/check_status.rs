//! Check status tool - reports progress of the running long operation

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::CHECK_STATUS;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Reads the channel-independent tool progress record
pub struct CheckStatusTool;

#[async_trait]
impl Tool for CheckStatusTool {
    fn name(&self) -> &'static str {
        CHECK_STATUS
    }

    fn description(&self) -> &'static str {
        "Check the progress of the operation currently being processed for the user. \
         Returns status, progress percent and tool name, or status 'idle' when nothing is running."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(namespace = %ctx.session.namespace, "CheckStatusTool::execute: called");
        match ctx.status.read_progress().await {
            Some(progress) => ToolResult::json(&json!({
                "status": progress.status,
                "progress": progress.progress,
                "tool_name": progress.tool_name,
            })),
            None => ToolResult::json(&json!({
                "status": "idle",
                "progress": null,
                "tool_name": null,
            })),
        }
    }
}
