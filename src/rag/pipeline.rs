// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval-augmented question answering
//!
//! Flow for one question:
//!
//! 1. Look up `(query, top_k)` in the retrieval cache
//! 2. On a miss, search the vector store and cache the results
//! 3. Build a prompt from the results and the current session's history
//! 4. Send the prompt to the generator (streamed or whole)
//! 5. Append the user turn (with its retrieved context) and the reply to the session

use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use super::errors::Result;
use super::generator::Generator;
use crate::cache::{CacheStats, RetrievalCache};
use crate::config::EngineConfig;
use crate::prompt::PromptAssembler;
use crate::session::{ChatSession, Role, SessionDetails, SessionStore, SessionSummary};
use crate::vector::{Embedder, RetrievalResult, VectorStore};

/// Result of one question
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub response: String,
    pub retrieved_context: Vec<RetrievalResult>,
    pub prompt: String,
}

/// Wires store, cache, assembler, sessions and generator together
pub struct RagPipeline {
    store: Arc<VectorStore>,
    cache: RetrievalCache,
    assembler: PromptAssembler,
    sessions: Mutex<SessionStore>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl RagPipeline {
    /// Assemble a pipeline from already built components
    pub fn new(
        config: &EngineConfig,
        store: Arc<VectorStore>,
        sessions: SessionStore,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            store,
            cache: RetrievalCache::from_config(&config.cache),
            assembler: PromptAssembler::new(config.prompt.clone()),
            sessions: Mutex::new(sessions),
            generator,
            top_k: config.retrieval.top_k,
        }
    }

    /// Build every component from configuration
    ///
    /// Validates the configuration, initializes the vector store backend and opens
    /// file-backed session storage.
    pub fn from_config(
        config: &EngineConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;

        let mut store = VectorStore::new().with_embedder(embedder);
        store.initialize(&config.vector_store)?;
        let sessions = SessionStore::from_config(&config.sessions)?;

        info!(
            "RAG pipeline ready (backend: {}, top_k: {}, generator: {})",
            config.vector_store.backend.as_str(),
            config.retrieval.top_k,
            generator.name()
        );
        Ok(Self::new(config, Arc::new(store), sessions, generator))
    }

    pub fn with_cache(mut self, cache: RetrievalCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Mutex<SessionStore> {
        &self.sessions
    }

    /// Cache-first retrieval
    ///
    /// Misses go to the vector store and successful results are cached. Errors
    /// propagate and are never cached.
    pub fn retrieve_context(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        let k = top_k.unwrap_or(self.top_k);
        if let Some(results) = self.cache.get(query, k) {
            debug!("Using cached context ({} documents)", results.len());
            return Ok(results);
        }

        let results = self.store.search(query, k)?;
        self.cache.set(query, k, results.clone());
        debug!("Retrieved {} documents", results.len());
        Ok(results)
    }

    fn retrieve(&self, query: &str, use_cache: bool) -> Result<Vec<RetrievalResult>> {
        if use_cache {
            self.retrieve_context(query, None)
        } else {
            self.store.search(query, self.top_k)
        }
    }

    /// Answer a question and record the exchange in the current session
    ///
    /// # Arguments
    /// * `query` - User question
    /// * `use_cache` - When false, always search the store and leave the cache untouched
    ///
    /// # Errors
    /// Retrieval and generation errors leave the session unchanged. A persistence
    /// error after generation is returned even though both turns were appended in memory.
    pub async fn ask(&self, query: &str, use_cache: bool) -> Result<Answer> {
        let retrieved_context = self.retrieve(query, use_cache)?;

        let mut sessions = self.sessions.lock().await;
        let prompt = self
            .assembler
            .build(query, &retrieved_context, sessions.history());

        info!("Generating response with {}", self.generator.name());
        let response = self.generator.generate(&prompt).await?;

        Self::record_exchange(&mut sessions, query, &response, &retrieved_context)?;
        Ok(Answer {
            response,
            retrieved_context,
            prompt,
        })
    }

    /// Like `ask`, but streams the response through `on_chunk`
    ///
    /// The stream is drained completely before anything is appended to the
    /// session. A failed chunk aborts the answer without touching the session.
    pub async fn ask_streaming<F>(&self, query: &str, use_cache: bool, mut on_chunk: F) -> Result<Answer>
    where
        F: FnMut(&str) + Send,
    {
        let retrieved_context = self.retrieve(query, use_cache)?;

        let mut sessions = self.sessions.lock().await;
        let prompt = self
            .assembler
            .build(query, &retrieved_context, sessions.history());

        info!("Generating streaming response with {}", self.generator.name());
        let receiver = self.generator.generate_stream(&prompt).await?;
        let mut stream = ReceiverStream::new(receiver);

        let mut response = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            on_chunk(&chunk);
            response.push_str(&chunk);
        }

        Self::record_exchange(&mut sessions, query, &response, &retrieved_context)?;
        Ok(Answer {
            response,
            retrieved_context,
            prompt,
        })
    }

    /// Append both turns, then report the first save failure if any
    fn record_exchange(
        sessions: &mut SessionStore,
        query: &str,
        response: &str,
        retrieved_context: &[RetrievalResult],
    ) -> Result<()> {
        let user_saved =
            sessions.append_message(Role::User, query, Some(retrieved_context.to_vec()));
        let assistant_saved = sessions.append_message(Role::Assistant, response, None);
        user_saved.and(assistant_saved)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Retrieval cache cleared");
    }

    /// Start a new current session, returning its id
    pub async fn start_session(&self, topic: Option<String>) -> Uuid {
        self.sessions.lock().await.start_new_session(topic).session_id
    }

    /// Make a persisted session current, `None` if it does not exist
    pub async fn load_session(&self, session_id: &Uuid) -> Result<Option<ChatSession>> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions.load_session(session_id)?.cloned())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.sessions.lock().await.list_sessions()
    }

    pub async fn session_summary(&self) -> Option<SessionDetails> {
        self.sessions.lock().await.session_summary()
    }
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .field("top_k", &self.top_k)
            .field("generator", &self.generator.name())
            .finish()
    }
}
