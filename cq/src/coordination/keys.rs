//! Well-known record keys
//!
//! Each key has exactly one writer; the owner is noted beside it.

/// Main channel status. Written by the main runner and its long-running tools.
pub const MAIN_STATUS: &str = "main_status";

/// Secondary channel status. Written by the secondary runner.
pub const SECONDARY_STATUS: &str = "secondary_status";

/// Abort request for the secondary. Written by the main runner.
pub const SECONDARY_ABORT: &str = "secondary_abort";

/// Messages the secondary produced while main ran. Written by the secondary runner.
pub const SECONDARY_INTERIM_MESSAGES: &str = "secondary_interim_messages";

/// Main completion marker. Written by the main runner.
pub const MAIN_OPERATION_COMPLETE: &str = "main_operation_complete";

/// Channel-independent progress of the current long-running tool.
pub const TOOL_PROGRESS: &str = "working-tool-status-update";

/// Key for a saved channel conversation
pub fn thread_key(thread_id: &str) -> String {
    format!("thread-{}", thread_id)
}
