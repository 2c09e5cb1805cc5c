//! Colloquy - dual-channel conversational coordinator
//!
//! A voice or chat agent normally goes silent while a slow tool runs. Colloquy
//! splits each conversation into two channels that share a namespaced
//! coordination store:
//!
//! - the **main** channel owns long-running operations and reports progress
//! - the **secondary** channel answers the user while main is busy
//!
//! When the operation finishes, main drains the secondary, folds the useful
//! parts of the interim chat into one synthesized reply, and resets the shared
//! records for the next turn.
//!
//! # Modules
//!
//! - [`session`] - Routing entry point ([`Conversation`])
//! - [`channels`] - Main and secondary runners, router, synthesis
//! - [`coordination`] - Typed records over the coordination store
//! - [`turn`] - Model/tool loop shared by both channels
//! - [`tools`] - Built-in tools and per-channel tool profiles
//! - [`llm`] - Model client trait and providers
//! - [`events`] - Reply events streamed to the client
//! - [`prompts`] - Embedded and overridable prompt templates
//! - [`repl`] - Interactive terminal front end
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod channels;
pub mod cli;
pub mod config;
pub mod context;
pub mod coordination;
pub mod demo;
pub mod events;
pub mod llm;
pub mod prompts;
pub mod repl;
pub mod session;
pub mod tools;
pub mod turn;

// Re-export commonly used types
pub use channels::{
    ChannelRouter, DrainResult, MainChannelRunner, MainOutcome, MainPhase, RouteDecision, SecondaryChannelRunner,
    SecondaryOutcome, SynthesisEngine,
};
pub use config::Config;
pub use context::SessionContext;
pub use coordination::{AbortController, Channel, Coordination, InterimLog, OperationStatus, StatusTracker};
pub use events::{EventBus, EventEmitter, ReplyEvent};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use prompts::PromptLoader;
pub use session::{Conversation, ConversationSettings, SendOutcome};
pub use tools::{Tool, ToolContext, ToolError, ToolExecutor, ToolResult};
pub use turn::{TurnEngine, TurnOutcome};
