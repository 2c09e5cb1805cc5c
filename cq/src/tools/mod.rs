//! Tool system for the conversation channels
//!
//! Each channel's turn engine owns a [`ToolExecutor`] built from a
//! [`ToolProfile`]. The main profile can start long-running operations; the
//! secondary profile is limited to status checks and read-only lookups.

mod context;
mod error;
mod executor;
mod traits;

pub mod builtin;

pub use context::ToolContext;
pub use error::ToolError;
pub use executor::{ToolExecutor, ToolProfile, ToolSettings};
pub use traits::{Tool, ToolResult};
