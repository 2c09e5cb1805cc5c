//! CLI argument parsing for coordstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cs")]
#[command(author, version, about = "Inspect and edit the coordination store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Namespace as `segment/segment` (overrides config)
    #[arg(short, long)]
    pub namespace: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a JSON value under a key
    Put {
        /// Record key
        #[arg(required = true)]
        key: String,

        /// JSON value (plain text is stored as a JSON string)
        #[arg(required = true)]
        value: String,
    },

    /// Print the value stored under a key
    Get {
        /// Record key
        #[arg(required = true)]
        key: String,
    },

    /// Delete a key (absent keys are fine)
    Delete {
        /// Record key
        #[arg(required = true)]
        key: String,
    },

    /// List every item in the namespace, oldest update first
    Search {
        /// Print full values instead of one-line summaries
        #[arg(short, long)]
        verbose: bool,
    },

    /// List namespaces that hold items
    Namespaces,
}
