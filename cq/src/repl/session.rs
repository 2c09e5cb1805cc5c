//! REPL session management

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::render::{format_snapshot, spawn_printer};
use crate::session::{Conversation, SendOutcome};

/// A line from the reader thread
#[derive(Debug)]
enum ReplInput {
    Line(String),
    /// Ctrl+C
    Interrupt,
    /// Ctrl+D or a readline failure
    Eof,
}

enum SlashResult {
    Continue,
    Quit,
}

/// Interactive chat session
///
/// Lines are read on a blocking thread so `/interrupt` and Ctrl+C reach a
/// secondary turn that is still running.
pub struct ReplSession {
    conversation: Arc<Conversation>,
    verbose: bool,
}

impl ReplSession {
    pub fn new(conversation: Arc<Conversation>) -> Self {
        Self {
            conversation,
            verbose: false,
        }
    }

    /// Also print main phase changes
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();
        let stop = CancellationToken::new();
        let printer = spawn_printer(self.conversation.subscribe(), self.verbose, stop.clone());
        let mut lines = spawn_reader()?;
        let mut pending: Option<JoinHandle<SendOutcome>> = None;

        while let Some(input) = lines.recv().await {
            let input = match input {
                ReplInput::Line(line) => line,
                ReplInput::Interrupt => {
                    self.interrupt().await;
                    continue;
                }
                ReplInput::Eof => break,
            };

            if input.starts_with('/') {
                match self.handle_slash_command(&input).await {
                    SlashResult::Continue => continue,
                    SlashResult::Quit => break,
                }
            }

            // One user message at a time; the next waits for the previous turn
            if let Some(previous) = pending.take()
                && let Err(e) = previous.await
            {
                warn!(error = %e, "Previous turn did not finish");
            }
            let conversation = self.conversation.clone();
            pending = Some(tokio::spawn(async move { conversation.send(&input).await }));
        }

        if let Some(previous) = pending.take() {
            let _ = previous.await;
        }
        if self.conversation.is_main_running().await {
            println!("{}", "Waiting for the running operation to finish...".dimmed());
        }
        self.conversation.shutdown().await;
        stop.cancel();
        let _ = printer.await;
        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        let session = self.conversation.session();
        println!();
        println!("{}", "Colloquy Interactive Chat".bright_cyan().bold());
        println!("Namespace: {}", session.namespace);
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let cmd = input.split_whitespace().next().unwrap_or("");
        debug!(%cmd, "ReplSession::handle_slash_command: called");
        match cmd {
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/status" | "/s" => {
                let snapshot = self.conversation.status_snapshot().await;
                println!("{}", format_snapshot(&snapshot));
                SlashResult::Continue
            }
            "/interrupt" | "/i" => {
                self.interrupt().await;
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    async fn interrupt(&self) {
        if self.conversation.interrupt().await {
            println!("{}", "Interrupted.".dimmed());
        } else {
            println!("{}", "Nothing to interrupt.".dimmed());
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Show what each channel is doing", "/status".yellow());
        println!("  {:14} Stop the current reply", "/interrupt".yellow());
        println!("  {:14} Exit (waits for a running operation)", "/quit".yellow());
        println!();
        println!("Anything else is sent to the assistant. While a long operation runs,");
        println!("messages are answered by the {} channel.", "[secondary]".bright_magenta());
        println!();
    }
}

/// Read lines on a blocking thread and forward them
fn spawn_reader() -> Result<mpsc::UnboundedReceiver<ReplInput>> {
    let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let input = match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line.as_str());
                    ReplInput::Line(line)
                }
                Err(ReadlineError::Interrupted) => ReplInput::Interrupt,
                Err(ReadlineError::Eof) => ReplInput::Eof,
                Err(err) => {
                    warn!(error = %err, "Readline error");
                    ReplInput::Eof
                }
            };
            let done = matches!(input, ReplInput::Eof);
            if tx.send(input).is_err() || done {
                break;
            }
        }
    });
    Ok(rx)
}
