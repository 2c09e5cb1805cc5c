use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde_json::Value;

use coordstore::cli::{Cli, Command};
use coordstore::config::Config;
use coordstore::{CoordinationStore, FileStore, Namespace};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

/// Accept JSON, fall back to a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn summarize(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 80 {
        let head: String = text.chars().take(77).collect();
        format!("{}...", head)
    } else {
        text
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.store.unwrap_or(config.store_path);
    let namespace = Namespace::parse(cli.namespace.as_deref().unwrap_or(&config.default_namespace))
        .context("Invalid namespace")?;

    info!("coordstore starting at {}", store_path.display());
    let store = FileStore::open(&store_path)
        .await
        .context(format!("Failed to open store at {}", store_path.display()))?;

    match cli.command {
        Command::Put { key, value } => {
            store.put(&namespace, &key, parse_value(&value)).await?;
            println!("{} {}/{}", "✓".green(), namespace, key.cyan());
        }
        Command::Get { key } => match store.get(&namespace, &key).await? {
            Some(item) => println!("{}", serde_json::to_string_pretty(&item.value)?),
            None => {
                eprintln!("{} {}/{} not found", "✗".red(), namespace, key);
                std::process::exit(1);
            }
        },
        Command::Delete { key } => {
            store.delete(&namespace, &key).await?;
            println!("{} Deleted {}/{}", "✓".green(), namespace, key);
        }
        Command::Search { verbose } => {
            let items = store.search(&namespace).await?;
            if items.is_empty() {
                println!("No items in {}", namespace);
            }
            for item in items {
                let stamp = item.updated_at.format("%H:%M:%S%.3f").to_string();
                if verbose {
                    println!("{} {}", item.key.yellow(), stamp.dimmed());
                    println!("{}", serde_json::to_string_pretty(&item.value)?);
                } else {
                    println!("{} {} {}", item.key.yellow(), stamp.dimmed(), summarize(&item.value));
                }
            }
        }
        Command::Namespaces => {
            let namespaces = store.namespaces().await?;
            if namespaces.is_empty() {
                println!("No namespaces found");
            }
            for ns in namespaces {
                println!("{}", ns);
            }
        }
    }

    Ok(())
}
