//! Built-in tools

mod account_summary;
mod check_status;
mod long_operation;

pub use account_summary::{AccountBook, AccountRecord, AccountSummaryTool};
pub use check_status::CheckStatusTool;
pub use long_operation::LongOperationTool;

pub const ACCOUNT_SUMMARY: &str = "account_summary";
pub const CHECK_STATUS: &str = "check_status";
pub const LONG_OPERATION: &str = "long_operation";
