// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector storage for context retrieval
//!
//! `VectorStore` is the facade callers use. It delegates to one of two backends
//! behind the `VectorBackend` trait:
//! - `FlatIndex`: in-memory, exact squared-L2 search
//! - `CollectionStore`: named on-disk collection searched through HNSW

pub mod collection;
pub mod embeddings;
pub mod flat;
pub mod store;
pub mod types;

use serde_json::Value;
use std::path::PathBuf;

use crate::config::BackendKind;
use crate::rag::errors::Result;

pub use collection::CollectionStore;
pub use embeddings::{Embedder, HashEmbedder};
pub use flat::FlatIndex;
pub use store::VectorStore;
pub use types::{QueryInput, RetrievalResult, StoreStats, VectorRecord};

/// Backend strategy behind `VectorStore`
///
/// Implementations validate batches before inserting anything and return results
/// ascending by distance. Callers have already checked `top_k > 0` and the query
/// dimension.
pub trait VectorBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fixed vector length, `None` until known
    fn dimension(&self) -> Option<usize>;

    /// Add a batch, returning the assigned ids in input order
    fn add_vectors(&self, vectors: Vec<Vec<f32>>, metadata: Vec<Value>) -> Result<Vec<String>>;

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>>;

    /// Remove records by id, returning how many existed
    fn delete(&self, ids: &[String]) -> Result<usize>;

    fn clear(&self) -> Result<()>;

    fn len(&self) -> Result<usize>;

    /// Where the backend persists its data, if anywhere
    fn location(&self) -> Option<PathBuf> {
        None
    }
}
