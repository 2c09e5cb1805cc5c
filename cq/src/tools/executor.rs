//! ToolExecutor - manages tool execution for one channel

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ToolsConfig;
use crate::llm::{ToolCall, ToolDefinition};

use super::builtin::{AccountBook, AccountSummaryTool, CheckStatusTool, LongOperationTool};
use super::{Tool, ToolContext, ToolError, ToolResult};

/// Tool profiles define which tools each channel may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolProfile {
    /// Everything, including long-running and mutating operations
    #[default]
    Main,
    /// Status checks and read-only lookups only
    Secondary,
}

/// Settings shared by the built-in tools
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub long_operation_steps: u32,
    pub long_operation_interval: Duration,
    pub accounts: Arc<AccountBook>,
}

impl ToolSettings {
    /// Build from config, loading the account fixture if one is named
    pub fn from_config(config: &ToolsConfig) -> Result<Self, ToolError> {
        let accounts = match &config.accounts_path {
            Some(path) => AccountBook::load(path)?,
            None => AccountBook::sample(),
        };
        Ok(Self {
            long_operation_steps: config.long_operation_steps,
            long_operation_interval: Duration::from_millis(config.long_operation_interval_ms),
            accounts: Arc::new(accounts),
        })
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            long_operation_steps: 10,
            long_operation_interval: Duration::from_secs(5),
            accounts: Arc::new(AccountBook::sample()),
        }
    }
}

/// Manages tool execution for a channel
pub struct ToolExecutor {
    profile: ToolProfile,
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolExecutor {
    /// Create executor with the built-in tools of a profile
    pub fn with_profile(profile: ToolProfile, settings: &ToolSettings) -> Self {
        debug!(?profile, "ToolExecutor::with_profile: called");
        let mut executor = Self {
            profile,
            tools: BTreeMap::new(),
        };

        match profile {
            ToolProfile::Main => {
                executor.add_tool(Box::new(LongOperationTool::new(
                    settings.long_operation_steps,
                    settings.long_operation_interval,
                )));
                executor.add_tool(Box::new(AccountSummaryTool::new(settings.accounts.clone())));
            }
            ToolProfile::Secondary => {
                executor.add_tool(Box::new(CheckStatusTool));
                executor.add_tool(Box::new(AccountSummaryTool::new(settings.accounts.clone())));
                // Never long_operation
            }
        }

        executor
    }

    /// Create an empty executor (for testing)
    pub fn empty(profile: ToolProfile) -> Self {
        Self {
            profile,
            tools: BTreeMap::new(),
        }
    }

    pub fn profile(&self) -> ToolProfile {
        self.profile
    }

    /// Add a tool to the executor
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        debug!(tool_name = %tool.name(), "ToolExecutor::add_tool: called");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions for the model, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| t.definition())
            .collect()
    }

    /// Execute a tool call
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        debug!(tool_name = %tool_call.name, tool_id = %tool_call.id, profile = ?self.profile, "ToolExecutor::execute: called");
        match self.tools.get(&tool_call.name) {
            Some(tool) => tool.execute(tool_call.input.clone(), ctx).await,
            None => {
                debug!("ToolExecutor::execute: unknown tool");
                ToolError::UnknownTool {
                    name: tool_call.name.clone(),
                }
                .into()
            }
        }
    }

    /// Execute the calls of one model response concurrently
    ///
    /// Results come back in call order, paired with their call ids.
    pub async fn execute_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> Vec<(String, ToolResult)> {
        debug!(count = %tool_calls.len(), "ToolExecutor::execute_all: called");
        join_all(
            tool_calls
                .iter()
                .map(|call| async move { (call.id.clone(), self.execute(call, ctx).await) }),
        )
        .await
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}
