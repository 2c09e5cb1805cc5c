//! One conversational turn: model calls interleaved with tool rounds

mod engine;
pub mod history;

pub use engine::{TurnEngine, TurnError, TurnOutcome};
