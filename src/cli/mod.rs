// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod index;
pub mod sessions;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::EngineConfig;

/// RAG context engine CLI
#[derive(Parser, Debug)]
#[command(name = "rag-context-cli")]
#[command(version)]
#[command(about = "Admin tools for chat sessions and vector collections", long_about = None)]
pub struct Cli {
    /// TOML configuration file (RAG_* environment variables override it)
    #[arg(long, global = true, env = "RAG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect or delete persisted chat sessions
    #[command(subcommand)]
    Sessions(sessions::SessionsCommand),

    /// Add texts to or search a persistent collection
    #[command(subcommand)]
    Index(index::IndexCommand),

    /// Show the effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
}

/// Load configuration: file (if any), then environment overrides, then validation
pub fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => EngineConfig::default(),
    };
    config.apply_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Sessions(command) => sessions::run(command, &config),
        Commands::Index(command) => index::run(command, &config),
        Commands::Config(ConfigCommand::Show) => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
            Ok(())
        }
    }
}
