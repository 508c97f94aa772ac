// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for retrieval, caching, prompt assembly and session history
//!
//! Configuration can come from defaults, a TOML file, or `RAG_*` environment
//! variables. Every section is optional in the file; missing sections and
//! unparsable environment values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::rag::errors::{RagError, Result};

/// Vector store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-memory brute-force index
    FlatIndex,
    /// Persistent collection backed by an HNSW index
    Collection,
}

impl BackendKind {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "flat" | "flat_index" | "flat-index" | "faiss" => Some(BackendKind::FlatIndex),
            "collection" | "persistent" | "chromadb" => Some(BackendKind::Collection),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::FlatIndex => "flat_index",
            BackendKind::Collection => "collection",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: BackendKind,
    /// Required for the flat index; the collection adopts the first inserted dimension when unset
    pub dimension: Option<usize>,
    pub collection_name: String,
    pub collection_dir: PathBuf,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::FlatIndex,
            dimension: Some(384),
            collection_name: "default_collection".to_string(),
            collection_dir: PathBuf::from("./vector_db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_size: usize,
    /// Trim and lowercase queries before fingerprinting (exact match when false)
    pub normalize_queries: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_size: 50,
            normalize_queries: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Limits for prompt assembly, all measured in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Number of most recent messages fed back as history
    pub context_window: usize,
    pub max_prompt_chars: usize,
    pub context_cap_chars: usize,
    pub history_cap_chars: usize,
    pub abstract_limit_chars: usize,
    pub message_limit_chars: usize,
    /// Allowance for the fixed instructional text around the blocks
    pub system_prompt_overhead: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            context_window: 2,
            max_prompt_chars: 3000,
            context_cap_chars: 1500,
            history_cap_chars: 1000,
            abstract_limit_chars: 500,
            message_limit_chars: 1000,
            system_prompt_overhead: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub auto_save: bool,
    pub save_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            save_dir: PathBuf::from("./chat_history"),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub vector_store: VectorStoreConfig,
    pub cache: CacheConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub sessions: SessionConfig,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl EngineConfig {
    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| RagError::Config(format!("invalid TOML in {}: {}", path.display(), e)))
    }

    /// Override fields from `RAG_*` environment variables when they are set and parse
    pub fn apply_env(&mut self) {
        if let Some(backend) = env::var("RAG_VECTOR_BACKEND")
            .ok()
            .and_then(|v| BackendKind::from_str(&v))
        {
            self.vector_store.backend = backend;
        }
        if let Some(dimension) = env_parse("RAG_VECTOR_DIMENSION") {
            self.vector_store.dimension = Some(dimension);
        }
        if let Ok(name) = env::var("RAG_COLLECTION_NAME") {
            self.vector_store.collection_name = name;
        }
        if let Ok(dir) = env::var("RAG_COLLECTION_DIR") {
            self.vector_store.collection_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = env_parse("RAG_CACHE_TTL_SECS") {
            self.cache.ttl_secs = ttl;
        }
        if let Some(size) = env_parse("RAG_CACHE_MAX_SIZE") {
            self.cache.max_size = size;
        }
        if let Some(flag) = env_flag("RAG_CACHE_NORMALIZE_QUERIES") {
            self.cache.normalize_queries = flag;
        }
        if let Some(top_k) = env_parse("RAG_TOP_K") {
            self.retrieval.top_k = top_k;
        }
        if let Some(window) = env_parse("RAG_CONTEXT_WINDOW") {
            self.prompt.context_window = window;
        }
        if let Some(budget) = env_parse("RAG_MAX_PROMPT_CHARS") {
            self.prompt.max_prompt_chars = budget;
        }
        if let Some(flag) = env_flag("RAG_SESSION_AUTO_SAVE") {
            self.sessions.auto_save = flag;
        }
        if let Ok(dir) = env::var("RAG_SESSION_DIR") {
            self.sessions.save_dir = PathBuf::from(dir);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.vector_store.backend == BackendKind::FlatIndex {
            match self.vector_store.dimension {
                None => {
                    return Err(RagError::Config(
                        "flat index backend requires a vector dimension".to_string(),
                    ))
                }
                Some(0) => {
                    return Err(RagError::Config(
                        "vector dimension must be greater than 0".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }
        if self.vector_store.backend == BackendKind::Collection
            && self.vector_store.collection_name.trim().is_empty()
        {
            return Err(RagError::Config(
                "collection backend requires a collection name".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(RagError::Config("Cache TTL must be greater than 0".to_string()));
        }
        if self.cache.max_size == 0 {
            return Err(RagError::Config(
                "Cache max size must be greater than 0".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }
        let prompt = &self.prompt;
        if prompt.max_prompt_chars == 0 {
            return Err(RagError::Config(
                "Prompt budget must be greater than 0".to_string(),
            ));
        }
        if prompt.context_cap_chars > prompt.max_prompt_chars
            || prompt.history_cap_chars > prompt.max_prompt_chars
        {
            return Err(RagError::Config(format!(
                "context cap ({}) and history cap ({}) must not exceed the prompt budget ({})",
                prompt.context_cap_chars, prompt.history_cap_chars, prompt.max_prompt_chars
            )));
        }
        Ok(())
    }
}
