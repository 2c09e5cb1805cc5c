//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Main channel system prompt
pub const MAIN: &str = include_str!("../../prompts/main.pmt");

/// Secondary channel system prompt
pub const SECONDARY: &str = include_str!("../../prompts/secondary.pmt");

/// System prompt for the synthesis call
pub const SYNTHESIS_SYSTEM: &str = include_str!("../../prompts/synthesis-system.pmt");

/// Synthesis instruction template
pub const SYNTHESIS: &str = include_str!("../../prompts/synthesis.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "main" => Some(MAIN),
        "secondary" => Some(SECONDARY),
        "synthesis-system" => Some(SYNTHESIS_SYSTEM),
        "synthesis" => Some(SYNTHESIS),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
