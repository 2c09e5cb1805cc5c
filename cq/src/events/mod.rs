//! Reply events delivered to the conversation's client
//!
//! Runners and tools emit through an [`EventEmitter`]; the client subscribes
//! on the [`EventBus`] and receives a [`ReplyEvent`] stream:
//!
//! ```text
//! SecondaryChannelRunner ─┐
//! MainChannelRunner ──────┼──► EventBus ──► REPL / demo / tests
//! long_operation tool ────┘   (broadcast, speech-sanitized, de-duplicated)
//! ```

mod bus;
mod speech;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use speech::tts_sanitize;
pub use types::ReplyEvent;
