//! Long operation tool - a multi-step account change that reports progress

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use super::LONG_OPERATION;
use crate::coordination::{Channel, OperationStatus};
use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

/// Runs `steps` steps of `interval` each, publishing progress after every step
///
/// Progress goes to both the main status record (which the router reads) and
/// the tool progress record (which `check_status` reads).
pub struct LongOperationTool {
    steps: u32,
    interval: Duration,
}

impl LongOperationTool {
    pub fn new(steps: u32, interval: Duration) -> Self {
        Self {
            steps: steps.max(1),
            interval,
        }
    }

    async fn publish(&self, ctx: &ToolContext, progress: u8, status: OperationStatus) {
        ctx.status.write_status(Channel::Main, LONG_OPERATION, progress, status).await;
        ctx.status.report_progress(LONG_OPERATION, progress, status).await;
    }
}

#[async_trait]
impl Tool for LongOperationTool {
    fn name(&self) -> &'static str {
        LONG_OPERATION
    }

    fn description(&self) -> &'static str {
        "Carry out a long-running change to the user's account, such as closing a contract \
         or changing their package. Takes a while; the user can keep chatting meanwhile."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "description": "Short description of the change, e.g. 'contract closure'"
                }
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "LongOperationTool::execute: called");
        let Some(operation) = input.get("operation").and_then(|v| v.as_str()) else {
            return ToolError::InvalidArgument("missing required parameter: operation".into()).into();
        };

        info!(%operation, steps = self.steps, namespace = %ctx.session.namespace, "Long operation started");
        ctx.notify(&format!(
            "Processing your {} request. This may take a moment...",
            operation
        ));
        self.publish(ctx, 0, OperationStatus::Running).await;

        for step in 1..=self.steps {
            tokio::time::sleep(self.interval).await;
            let progress = percent_done(step, self.steps);
            debug!(%step, %progress, "LongOperationTool::execute: step done");
            self.publish(ctx, progress, OperationStatus::Running).await;
        }

        self.publish(ctx, 100, OperationStatus::Completed).await;
        info!(%operation, "Long operation completed");

        ToolResult::json(&json!({
            "operation": operation,
            "status": "completed",
            "steps": self.steps,
        }))
    }
}

/// Whole percent of `steps` finished after `step`
fn percent_done(step: u32, steps: u32) -> u8 {
    (u64::from(step) * 100 / u64::from(steps.max(1))).min(100) as u8
}
