//! Prompt Loader
//!
//! Loads prompt templates from the override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;
use crate::coordination::Channel;

/// Variables of the synthesis template
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisContext<'a> {
    pub tool_result: &'a str,
    pub interim_conversation: &'a str,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.colloquy/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader rooted at `root`, picking up `.colloquy/prompts/` if present
    pub fn new(root: impl AsRef<Path>) -> Self {
        let user_dir = root.as_ref().join(".colloquy/prompts");
        let exists = user_dir.is_dir();
        debug!(?user_dir, %exists, "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            user_dir: exists.then_some(user_dir),
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        // Output goes to a model, not a browser
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name: override directory first, then embedded
    pub fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                info!("Using prompt override {}", path.display());
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// System prompt for a channel's conversation turns
    pub fn system_prompt(&self, channel: Channel) -> Result<String> {
        let name = match channel {
            Channel::Main => "main",
            Channel::Secondary => "secondary",
        };
        self.load_template(name).map(|p| p.trim_end().to_string())
    }

    pub fn synthesis_system_prompt(&self) -> Result<String> {
        self.load_template("synthesis-system").map(|p| p.trim_end().to_string())
    }

    /// Render the synthesis instruction for one finished operation
    pub fn render_synthesis(&self, tool_result: &str, interim_conversation: &str) -> Result<String> {
        debug!(
            result_len = tool_result.len(),
            interim_len = interim_conversation.len(),
            "PromptLoader::render_synthesis: called"
        );
        let template = self.load_template("synthesis")?;
        let context = SynthesisContext {
            tool_result,
            interim_conversation,
        };
        self.hbs
            .render_template(&template, &context)
            .map_err(|e| eyre!("Failed to render template synthesis: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{SYNTHESIS_INTERIM_MARKER, SYNTHESIS_RESULT_MARKER};
    use tempfile::TempDir;

    #[test]
    fn test_render_synthesis_keeps_text_verbatim() {
        let loader = PromptLoader::embedded_only();
        let rendered = loader
            .render_synthesis("Package changed to \"Premium Plus\" & active", "user: any jokes?")
            .unwrap();
        assert!(rendered.contains("Package changed to \"Premium Plus\" & active"));
        assert!(rendered.contains("user: any jokes?"));
        let result_at = rendered.find(SYNTHESIS_RESULT_MARKER).unwrap();
        let interim_at = rendered.find(SYNTHESIS_INTERIM_MARKER).unwrap();
        assert!(result_at < interim_at);
    }

    #[test]
    fn test_system_prompts_differ_per_channel() {
        let loader = PromptLoader::embedded_only();
        let main = loader.system_prompt(Channel::Main).unwrap();
        let secondary = loader.system_prompt(Channel::Secondary).unwrap();
        assert_ne!(main, secondary);
        assert!(!main.ends_with('\n'));
    }

    #[test]
    fn test_user_override_wins() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".colloquy/prompts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("secondary.pmt"), "Custom helper prompt").unwrap();

        let loader = PromptLoader::new(temp.path());
        assert_eq!(loader.system_prompt(Channel::Secondary).unwrap(), "Custom helper prompt");
        assert!(loader.system_prompt(Channel::Main).unwrap().contains("long_operation"));
    }

    #[test]
    fn test_strict_mode_rejects_missing_variable() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".colloquy/prompts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("synthesis.pmt"), "{{tool_result}} {{missing}}").unwrap();

        let loader = PromptLoader::new(temp.path());
        assert!(loader.render_synthesis("done", "").is_err());
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.load_template("nonexistent-template").is_err());
    }
}
