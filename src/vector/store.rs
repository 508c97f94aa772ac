// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::collection::CollectionStore;
use super::embeddings::Embedder;
use super::flat::FlatIndex;
use super::types::{QueryInput, RetrievalResult, StoreStats};
use super::VectorBackend;
use crate::config::{BackendKind, VectorStoreConfig};
use crate::rag::errors::{RagError, Result};

/// Uniform vector store over the flat and collection backends
///
/// Created empty, then bound to a backend by `initialize`. Every operation other
/// than attaching an embedder fails with `NotInitialized` until then.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = VectorStore::new().with_embedder(Arc::new(HashEmbedder::new(384)?));
/// store.initialize(&VectorStoreConfig::default())?;
/// store.add_texts(&["attention is all you need"], None)?;
/// let hits = store.search("transformers", 5)?;
/// ```
#[derive(Default)]
pub struct VectorStore {
    backend: Option<Box<dyn VectorBackend>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("backend", &self.backend.as_ref().map(|b| b.kind()))
            .field("has_embedder", &self.embedder.is_some())
            .finish()
    }
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn set_embedder(&mut self, embedder: Arc<dyn Embedder>) {
        self.embedder = Some(embedder);
    }

    /// Bind the store to a backend
    ///
    /// # Arguments
    /// * `config` - Backend kind, dimension and (for collections) name and directory
    ///
    /// # Errors
    /// * `Config` if the flat backend has no dimension or a zero dimension
    /// * `Persistence` if a collection directory or file cannot be read
    pub fn initialize(&mut self, config: &VectorStoreConfig) -> Result<()> {
        let backend: Box<dyn VectorBackend> = match config.backend {
            BackendKind::FlatIndex => {
                let dimension = config.dimension.ok_or_else(|| {
                    RagError::Config("flat index backend requires a vector dimension".to_string())
                })?;
                Box::new(FlatIndex::new(dimension)?)
            }
            BackendKind::Collection => Box::new(CollectionStore::open(
                &config.collection_dir,
                &config.collection_name,
                config.dimension,
            )?),
        };

        info!(
            "Vector store initialized with {} backend (dimension: {:?})",
            backend.kind().as_str(),
            backend.dimension()
        );
        self.backend = Some(backend);
        Ok(())
    }

    /// Bind the store to an already constructed backend
    pub fn with_backend(mut self, backend: Box<dyn VectorBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.backend.as_ref().and_then(|b| b.dimension())
    }

    fn backend(&self) -> Result<&dyn VectorBackend> {
        self.backend.as_deref().ok_or(RagError::NotInitialized)
    }

    /// Add vectors with metadata
    ///
    /// The whole batch is validated first; on error nothing is inserted.
    /// Returns the record ids in input order.
    pub fn add_vectors(&self, vectors: Vec<Vec<f32>>, metadata: Vec<Value>) -> Result<Vec<String>> {
        self.backend()?.add_vectors(vectors, metadata)
    }

    /// Embed texts and add them
    ///
    /// When `metadata` is `None` each record gets `{"text": <text>, "index": <position>}`.
    pub fn add_texts<S: AsRef<str>>(
        &self,
        texts: &[S],
        metadata: Option<Vec<Value>>,
    ) -> Result<Vec<String>> {
        let backend = self.backend()?;
        let embedder = self.embedder.as_ref().ok_or(RagError::EncoderNotReady)?;

        let metadata = metadata.unwrap_or_else(|| {
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| json!({"text": text.as_ref(), "index": i}))
                .collect()
        });
        if metadata.len() != texts.len() {
            return Err(RagError::InvalidInput(format!(
                "got {} texts but {} metadata entries",
                texts.len(),
                metadata.len()
            )));
        }

        let vectors = texts
            .iter()
            .map(|text| embedder.embed(text.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        debug!("Embedded {} texts", vectors.len());
        backend.add_vectors(vectors, metadata)
    }

    /// Search for the `top_k` nearest records
    ///
    /// # Arguments
    /// * `query` - A vector, or text to embed with the configured embedder
    /// * `top_k` - Maximum number of results; clamped to the store size
    ///
    /// # Returns
    /// Results ascending by distance, ties in insertion order
    pub fn search<'a>(
        &self,
        query: impl Into<QueryInput<'a>>,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let backend = self.backend()?;
        if top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be at least 1".to_string()));
        }

        let embedded;
        let vector: &[f32] = match query.into() {
            QueryInput::Vector(v) => v,
            QueryInput::Text(text) => {
                let embedder = self.embedder.as_ref().ok_or(RagError::EncoderNotReady)?;
                embedded = embedder.embed(text)?;
                &embedded
            }
        };

        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RagError::InvalidInput(
                "query vector contains NaN or Infinity".to_string(),
            ));
        }

        // A collection that has never seen a vector has nothing to match against
        let Some(dimension) = backend.dimension() else {
            return Ok(Vec::new());
        };
        if vector.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        let results = backend.search(vector, top_k)?;
        debug!("Vector search returned {} of top {}", results.len(), top_k);
        Ok(results)
    }

    /// Remove records by id, returning how many were removed
    pub fn delete(&self, ids: &[String]) -> Result<usize> {
        self.backend()?.delete(ids)
    }

    pub fn clear(&self) -> Result<()> {
        self.backend()?.clear()
    }

    pub fn len(&self) -> Result<usize> {
        self.backend()?.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let backend = self.backend()?;
        Ok(StoreStats {
            backend: backend.kind(),
            dimension: backend.dimension(),
            count: backend.len()?,
            location: backend.location(),
        })
    }
}
