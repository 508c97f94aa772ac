// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{BackendKind, EngineConfig};
use crate::vector::{Embedder, HashEmbedder, VectorStore};

const DEFAULT_DIMENSION: usize = 384;

#[derive(Subcommand, Debug)]
pub enum IndexCommand {
    /// Embed texts with the hash embedder and add them to the collection
    AddTexts {
        /// Texts to add
        texts: Vec<String>,

        /// File with one text per line
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Search the collection
    Search {
        /// Query text
        query: String,

        /// Number of results (defaults to the configured top-K)
        #[arg(long)]
        top_k: Option<usize>,
    },
}

/// Open the configured collection with a hash embedder attached
fn open_collection(config: &EngineConfig) -> Result<VectorStore> {
    let mut store_config = config.vector_store.clone();
    store_config.backend = BackendKind::Collection;

    let dimension = store_config.dimension.unwrap_or(DEFAULT_DIMENSION);
    store_config.dimension = Some(dimension);
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(dimension)?);

    let mut store = VectorStore::new().with_embedder(embedder);
    store.initialize(&store_config)?;
    Ok(store)
}

pub fn run(command: IndexCommand, config: &EngineConfig) -> Result<()> {
    let store = open_collection(config)?;

    match command {
        IndexCommand::AddTexts { mut texts, file } => {
            if let Some(path) = file {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                texts.extend(
                    contents
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                );
            }
            if texts.is_empty() {
                return Err(anyhow!("No texts given. Pass texts or --file"));
            }

            let ids = store.add_texts(&texts, None)?;
            info!("Added {} texts", ids.len());
            let stats = store.stats()?;
            println!(
                "Added {} texts to {:?} ({} vectors total)",
                ids.len(),
                stats.location.unwrap_or_default(),
                stats.count
            );
        }
        IndexCommand::Search { query, top_k } => {
            let k = top_k.unwrap_or(config.retrieval.top_k);
            let results = store.search(&query, k)?;
            if results.is_empty() {
                println!("No results");
            }
            for (rank, result) in results.iter().enumerate() {
                let text = result
                    .metadata
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                println!("{}. {} (distance {:.4}) {}", rank + 1, result.id, result.distance, text);
            }
        }
    }

    Ok(())
}
