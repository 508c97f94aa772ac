// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::session::SessionStore;

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List sessions, most recently updated first
    List,

    /// Show one session's summary and messages
    Show {
        /// Session id (UUID)
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session id (UUID)
        id: String,
    },
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid session id: {}", id))
}

pub fn run(command: SessionsCommand, config: &EngineConfig) -> Result<()> {
    let mut store = SessionStore::from_config(&config.sessions)?;

    match command {
        SessionsCommand::List => {
            let sessions = store.list_sessions()?;
            if sessions.is_empty() {
                println!("No sessions in {:?}", config.sessions.save_dir);
                return Ok(());
            }
            for summary in sessions {
                println!(
                    "{}  {:<24}  {:>4} messages  updated {}",
                    summary.session_id,
                    summary.topic.as_deref().unwrap_or("(no topic)"),
                    summary.message_count,
                    summary.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        SessionsCommand::Show { id } => {
            let id = parse_id(&id)?;
            if store.load_session(&id)?.is_none() {
                return Err(anyhow!("Session not found: {}", id));
            }
            let details = store
                .session_summary()
                .ok_or_else(|| anyhow!("Session not found: {}", id))?;
            println!("{}", serde_json::to_string_pretty(&details)?);

            for message in store.history() {
                println!("\n[{}] {}:", message.timestamp.to_rfc3339(), message.role.label());
                println!("{}", message.content);
            }
        }
        SessionsCommand::Delete { id } => {
            let id = parse_id(&id)?;
            store.delete_session(&id)?;
            println!("Deleted session {}", id);
        }
    }

    Ok(())
}
