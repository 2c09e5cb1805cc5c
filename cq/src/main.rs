//! Colloquy - dual-channel conversational coordinator
//!
//! CLI entry point: interactive chat, the scripted demo, and a status view.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use colloquy::cli::{Cli, Command};
use colloquy::config::{Config, StoreBackend};
use colloquy::context::SessionContext;
use colloquy::demo;
use colloquy::llm::create_client;
use colloquy::prompts::PromptLoader;
use colloquy::repl::{ReplSession, format_snapshot, spawn_printer};
use colloquy::session::{Conversation, ConversationSettings};
use colloquy::tools::ToolSettings;
use coordstore::{FileStore, MemoryStore, StoreRef};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("colloquy")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("colloquy.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    if let Some(provider) = &cli.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(user) = &cli.user {
        config.agent.user_id = user.clone();
    }
    if let Some(Command::Demo { step_ms }) = &cli.command {
        config.tools.long_operation_interval_ms = *step_ms;
    }
    config.validate()?;
    info!(provider = %config.llm.provider, user = %config.agent.user_id, "Colloquy loaded config");

    let conversation = Arc::new(build_conversation(&config).await?);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => ReplSession::new(conversation).verbose(cli.verbose).run().await,
        Command::Demo { .. } => cmd_demo(&conversation, cli.verbose).await,
        Command::Status => cmd_status(&conversation).await,
    }
}

async fn open_store(config: &Config) -> Result<StoreRef> {
    debug!(backend = ?config.store.backend, "open_store: called");
    let store: StoreRef = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(
            FileStore::open(&config.store.path)
                .await
                .context(format!("Failed to open store at {}", config.store.path.display()))?,
        ),
    };
    Ok(store)
}

async fn build_conversation(config: &Config) -> Result<Conversation> {
    let store = open_store(config).await?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let session = SessionContext::new(&config.agent.user_id, &config.agent.feature)?;
    let tools = ToolSettings::from_config(&config.tools)?;
    let root = std::env::current_dir().context("Failed to read current directory")?;
    let prompts = Arc::new(PromptLoader::new(&root));
    Conversation::new(
        session,
        store,
        llm,
        &tools,
        prompts,
        ConversationSettings::from_config(config),
    )
}

async fn cmd_demo(conversation: &Conversation, verbose: bool) -> Result<()> {
    let stop = CancellationToken::new();
    let printer = spawn_printer(conversation.subscribe(), verbose, stop.clone());
    demo::run_demo(conversation).await;
    conversation.shutdown().await;
    stop.cancel();
    let _ = printer.await;
    Ok(())
}

async fn cmd_status(conversation: &Conversation) -> Result<()> {
    println!("Namespace: {}", conversation.session().namespace);
    println!("{}", format_snapshot(&conversation.status_snapshot().await));
    Ok(())
}
