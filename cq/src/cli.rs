//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Colloquy - dual-channel conversational coordinator
#[derive(Parser)]
#[command(
    name = "cq",
    about = "Keep talking to the user while a long operation runs in the background",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Model provider override (openai, mock)
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    /// User id override; first namespace segment
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Also print main channel phase changes
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to chat)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat
    Chat,

    /// Scripted scenario: a long operation with questions asked while it runs
    Demo {
        /// Duration of one long-operation step in milliseconds
        #[arg(long, default_value_t = 1_000)]
        step_ms: u64,
    },

    /// Show the coordination records of the user's namespace
    Status,
}
