//! Prompt templates
//!
//! Template loading chain:
//! 1. `.colloquy/prompts/{name}.pmt` (user override)
//! 2. Embedded fallback compiled from `cq/prompts/`
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{PromptLoader, SynthesisContext};

/// Line that introduces the operation result in the synthesis template
pub const SYNTHESIS_RESULT_MARKER: &str = "Here is the result from the operation:";

/// Line that introduces the interim conversation in the synthesis template
pub const SYNTHESIS_INTERIM_MARKER: &str = "While the operation was running, we had this conversation:";
