//! Account summary tool - read-only lookup of the user's package and usage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::ACCOUNT_SUMMARY;
use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

/// Entry used when a user has no record of their own
const FALLBACK_ACCOUNT: &str = "default";

/// One user's account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct AccountRecord {
    pub package: String,
    pub data_allowance_gb: f64,
    pub data_used_gb: f64,
    pub monthly_fee: f64,
    #[serde(default)]
    pub roaming_enabled: bool,
    #[serde(default)]
    pub contract_end: Option<String>,
}

/// Account records keyed by user id, loaded from a YAML fixture
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    accounts: HashMap<String, AccountRecord>,
}

impl AccountBook {
    pub fn load(path: &Path) -> Result<Self, ToolError> {
        let fixture_error = |reason: String| ToolError::Fixture {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| fixture_error(e.to_string()))?;
        Self::from_yaml(&content).map_err(|e| fixture_error(e.to_string()))
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        let accounts: HashMap<String, AccountRecord> = serde_yaml::from_str(content)?;
        Ok(Self { accounts })
    }

    /// Built-in data for demos and tests
    pub fn sample() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(
            "demo_user".to_string(),
            AccountRecord {
                package: "Premium".to_string(),
                data_allowance_gb: 50.0,
                data_used_gb: 18.5,
                monthly_fee: 45.0,
                roaming_enabled: true,
                contract_end: Some("2027-03-31".to_string()),
            },
        );
        accounts.insert(
            FALLBACK_ACCOUNT.to_string(),
            AccountRecord {
                package: "Essentials".to_string(),
                data_allowance_gb: 10.0,
                data_used_gb: 2.0,
                monthly_fee: 15.0,
                roaming_enabled: false,
                contract_end: None,
            },
        );
        Self { accounts }
    }

    pub fn lookup(&self, user_id: &str) -> Result<&AccountRecord, ToolError> {
        self.accounts
            .get(user_id)
            .or_else(|| self.accounts.get(FALLBACK_ACCOUNT))
            .ok_or_else(|| ToolError::AccountNotFound {
                user_id: user_id.to_string(),
            })
    }
}

/// Reports package, data usage and fees for the session's user
pub struct AccountSummaryTool {
    book: std::sync::Arc<AccountBook>,
}

impl AccountSummaryTool {
    pub fn new(book: std::sync::Arc<AccountBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl Tool for AccountSummaryTool {
    fn name(&self) -> &'static str {
        ACCOUNT_SUMMARY
    }

    fn description(&self) -> &'static str {
        "Look up the user's current package, data allowance, data used this month and monthly fee. Read-only."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(user_id = %ctx.session.user_id, "AccountSummaryTool::execute: called");
        match self.book.lookup(&ctx.session.user_id) {
            Ok(record) => ToolResult::json(record),
            Err(e) => e.into(),
        }
    }
}
