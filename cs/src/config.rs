//! Configuration for coordstore

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Path to the file store directory
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Namespace used when a command does not name one
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("colloquy")
        .join("store")
}

fn default_namespace() -> String {
    format!("demo_user/{}", crate::DEFAULT_FEATURE)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            default_namespace: default_namespace(),
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::load_from_file(config_path)
                .context(format!("Failed to load config from {}", config_path.display()));
        }

        // Try default locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("coordstore").join("config.yml")),
            Some(PathBuf::from("coordstore.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        Ok(Config::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.store_path.ends_with("colloquy/store"));
        assert_eq!(config.default_namespace, "demo_user/tools_updates");
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cs.yml");
        let config = Config {
            store_path: temp.path().join("store"),
            default_namespace: "alice/billing".to_string(),
        };
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("store-path"));

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.store_path, temp.path().join("store"));
        assert_eq!(loaded.default_namespace, "alice/billing");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cs.yml");
        std::fs::write(&path, "default-namespace: bob/x\n").unwrap();
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.default_namespace, "bob/x");
        assert!(loaded.store_path.ends_with("colloquy/store"));
    }
}
