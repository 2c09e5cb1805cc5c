//! Colloquy configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Colloquy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model provider configuration
    pub llm: LlmConfig,

    /// Timing of the main/secondary handshake
    pub coordination: CoordinationConfig,

    /// Conversation defaults
    pub agent: AgentConfig,

    /// Where coordination records live
    pub store: StoreConfig,

    /// Built-in tool settings
    pub tools: ToolsConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `.colloquy.yml`, then the user config directory,
    /// then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".colloquy.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("colloquy").join("colloquy.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Check settings that would otherwise fail deep inside a conversation
    pub fn validate(&self) -> Result<()> {
        if self.llm.provider == "openai" && std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre!(
                "LLM API key not found. Set the {} environment variable or use --provider mock.",
                self.llm.api_key_env
            ));
        }
        if self.tools.long_operation_steps == 0 {
            return Err(eyre!("tools.long-operation-steps must be at least 1"));
        }
        if self.agent.max_turns == 0 {
            return Err(eyre!("agent.max-turns must be at least 1"));
        }
        let coordination = &self.coordination;
        if coordination.drain_poll_interval_ms == 0 {
            return Err(eyre!("coordination.drain-poll-interval-ms must be at least 1"));
        }
        if coordination.drain_max_wait_ms < coordination.drain_poll_interval_ms {
            return Err(eyre!(
                "coordination.drain-max-wait-ms ({}) must not be shorter than drain-poll-interval-ms ({})",
                coordination.drain_max_wait_ms,
                coordination.drain_poll_interval_ms
            ));
        }
        Ok(())
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "mock")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| eyre!("Environment variable {} is not set", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 1024,
            timeout_ms: 60_000,
        }
    }
}

/// Timing of the drain, abort and cooldown steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    #[serde(rename = "drain-poll-interval-ms")]
    pub drain_poll_interval_ms: u64,

    #[serde(rename = "drain-max-wait-ms")]
    pub drain_max_wait_ms: u64,

    /// Pause after requesting an abort before reading the transcript
    #[serde(rename = "abort-grace-ms")]
    pub abort_grace_ms: u64,

    /// Quiet period after a main operation completes
    #[serde(rename = "router-cooldown-ms")]
    pub router_cooldown_ms: u64,
}

impl CoordinationConfig {
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    pub fn drain_max_wait(&self) -> Duration {
        Duration::from_millis(self.drain_max_wait_ms)
    }

    pub fn abort_grace(&self) -> Duration {
        Duration::from_millis(self.abort_grace_ms)
    }

    pub fn router_cooldown(&self) -> Duration {
        Duration::from_millis(self.router_cooldown_ms)
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            drain_poll_interval_ms: 500,
            drain_max_wait_ms: 15_000,
            abort_grace_ms: 200,
            router_cooldown_ms: 2_000,
        }
    }
}

/// Conversation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Identifies the user; first namespace segment
    #[serde(rename = "user-id")]
    pub user_id: String,

    /// Second namespace segment
    pub feature: String,

    /// History kept per channel thread
    #[serde(rename = "max-messages")]
    pub max_messages: usize,

    /// Model calls allowed per user turn
    #[serde(rename = "max-turns")]
    pub max_turns: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            user_id: "demo_user".to_string(),
            feature: coordstore::DEFAULT_FEATURE.to_string(),
            max_messages: 40,
            max_turns: 8,
        }
    }
}

/// Store backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

/// Coordination store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Directory for the file backend
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("colloquy")
                .join("store"),
        }
    }
}

/// Built-in tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    #[serde(rename = "long-operation-steps")]
    pub long_operation_steps: u32,

    #[serde(rename = "long-operation-interval-ms")]
    pub long_operation_interval_ms: u64,

    /// YAML fixture with account records; built-in sample data when unset
    #[serde(rename = "accounts-path")]
    pub accounts_path: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            long_operation_steps: 10,
            long_operation_interval_ms: 5_000,
            accounts_path: None,
        }
    }
}
