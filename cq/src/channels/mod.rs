//! The two conversation channels and the router between them
//!
//! The main channel owns the long-running work and, once it finishes,
//! drains the secondary channel and folds whatever was said meanwhile into
//! its final reply. The secondary channel keeps the user company with a
//! restricted tool set while the main channel is busy.

mod main_runner;
mod router;
mod secondary;
mod synthesis;

pub use main_runner::{DrainResult, MainChannelRunner, MainOutcome};
pub use router::{ChannelRouter, RouteDecision};
pub use secondary::{SecondaryChannelRunner, SecondaryOutcome};
pub use synthesis::{PROGRESS_KEYWORDS, SynthesisEngine, is_meaningful, meaningful_messages, render_interim};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::CoordinationConfig;

/// Reply used when the model cannot be reached
pub const FALLBACK_REPLY: &str = "Sorry, I ran into a problem on my side. Could you say that again?";

/// Main runner state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainPhase {
    Idle,
    RunningTools,
    AwaitingDrain,
    Synthesizing,
    Done,
}

impl fmt::Display for MainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MainPhase::Idle => write!(f, "idle"),
            MainPhase::RunningTools => write!(f, "running_tools"),
            MainPhase::AwaitingDrain => write!(f, "awaiting_drain"),
            MainPhase::Synthesizing => write!(f, "synthesizing"),
            MainPhase::Done => write!(f, "done"),
        }
    }
}

/// One user message handed to a runner
#[derive(Debug, Clone)]
pub struct ChannelInput {
    pub text: String,

    /// Start a fresh interim transcript instead of appending
    pub interim_messages_reset: bool,
}

impl ChannelInput {
    pub fn new(text: impl Into<String>, interim_messages_reset: bool) -> Self {
        Self {
            text: text.into(),
            interim_messages_reset,
        }
    }
}

/// How long the main runner waits for the secondary to go idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    /// Pause after requesting an abort
    pub abort_grace: Duration,
}

impl DrainPolicy {
    pub fn from_config(config: &CoordinationConfig) -> Self {
        Self {
            poll_interval: config.drain_poll_interval(),
            max_wait: config.drain_max_wait(),
            abort_grace: config.abort_grace(),
        }
    }
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self::from_config(&CoordinationConfig::default())
    }
}
