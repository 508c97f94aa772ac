// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistent collection store
//!
//! A named collection of vectors kept on disk as a JSON file and searched through
//! an HNSW index. Distance and ranking come from the index (Euclidean distance);
//! this module only normalises hits into `RetrievalResult`.
//!
//! ## Layout
//!
//! ```text
//! <collection_dir>/<collection_name>.json
//! ```
//!
//! The file is rewritten atomically (temp file + rename) after every mutation, and
//! reloaded on `open`, so a collection survives process restarts.

use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use super::types::{record_id, validate_batch, RetrievalResult, VectorRecord};
use super::VectorBackend;
use crate::config::BackendKind;
use crate::rag::errors::{RagError, Result};

/// HNSW parameters
const MAX_NB_CONNECTION: usize = 16;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const MIN_CAPACITY: usize = 1024;

/// On-disk collection format
#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    name: String,
    dimension: Option<usize>,
    next_seq: u64,
    records: Vec<VectorRecord>,
}

struct CollectionInner {
    dimension: Option<usize>,
    records: Vec<VectorRecord>,
    positions: HashMap<String, usize>,
    next_seq: u64,
    /// HNSW data ids are positions in `records`
    index: Hnsw<'static, f32, DistL2>,
    capacity: usize,
}

impl CollectionInner {
    fn new(dimension: Option<usize>, records: Vec<VectorRecord>, next_seq: u64) -> Self {
        let capacity = (records.len() * 2).max(MIN_CAPACITY);
        let mut inner = Self {
            dimension,
            positions: HashMap::new(),
            records,
            next_seq,
            index: new_index(capacity),
            capacity,
        };
        inner.rebuild_index();
        inner
    }

    /// Rebuild positions and the HNSW index from `records`
    fn rebuild_index(&mut self) {
        self.capacity = (self.records.len() * 2).max(MIN_CAPACITY);
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let mut index = new_index(self.capacity);
        for (slot, record) in self.records.iter().enumerate() {
            index.insert((&record.embedding, slot));
        }
        index.set_searching_mode(true);
        self.index = index;
    }

    /// Install a snapshot that is already on disk
    fn commit(&mut self, file: CollectionFile) {
        self.dimension = file.dimension;
        self.next_seq = file.next_seq;
        self.records = file.records;
        self.rebuild_index();
    }
}

fn new_index(capacity: usize) -> Hnsw<'static, f32, DistL2> {
    Hnsw::new(MAX_NB_CONNECTION, capacity, MAX_LAYER, EF_CONSTRUCTION, DistL2)
}

/// Persistent, named vector collection
pub struct CollectionStore {
    name: String,
    path: PathBuf,
    inner: RwLock<CollectionInner>,
}

impl std::fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl CollectionStore {
    /// Open (or create) a collection
    ///
    /// # Arguments
    /// * `dir` - Directory holding collection files (created if missing)
    /// * `name` - Collection name, also the file stem
    /// * `dimension` - Expected dimension; `None` adopts the first inserted dimension
    ///
    /// # Errors
    /// * `Config` if the stored collection has a different dimension than requested
    /// * `Persistence` if the directory or file cannot be read
    pub fn open(dir: impl AsRef<Path>, name: &str, dimension: Option<usize>) -> Result<Self> {
        let dir = dir.as_ref();
        if name.trim().is_empty() {
            return Err(RagError::Config("collection name is empty".to_string()));
        }
        if dimension == Some(0) {
            return Err(RagError::Config(
                "collection dimension must be greater than 0".to_string(),
            ));
        }

        fs::create_dir_all(dir).map_err(|e| RagError::persistence(dir, e))?;
        let path = dir.join(format!("{}.json", name));

        let inner = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| RagError::persistence(&path, e))?;
            let file: CollectionFile = serde_json::from_str(&content)
                .map_err(|e| RagError::persistence(&path, e))?;

            let stored_dimension = file.dimension;
            let dimension = match (dimension, stored_dimension) {
                (Some(requested), Some(stored)) if requested != stored => {
                    return Err(RagError::Config(format!(
                        "collection '{}' holds {}D vectors but {}D was configured",
                        name, stored, requested
                    )));
                }
                (requested, stored) => stored.or(requested),
            };

            info!(
                "Loaded collection '{}' with {} vectors from {:?}",
                name,
                file.records.len(),
                path
            );
            CollectionInner::new(dimension, file.records, file.next_seq)
        } else {
            info!("Created new collection '{}' at {:?}", name, path);
            CollectionInner::new(dimension, Vec::new(), 0)
        };

        Ok(Self {
            name: name.to_string(),
            path,
            inner: RwLock::new(inner),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a stored record by id
    pub fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        let inner = self.read()?;
        Ok(inner
            .positions
            .get(id)
            .map(|&pos| inner.records[pos].clone()))
    }

    fn staged(
        &self,
        dimension: Option<usize>,
        next_seq: u64,
        records: Vec<VectorRecord>,
    ) -> CollectionFile {
        CollectionFile {
            name: self.name.clone(),
            dimension,
            next_seq,
            records,
        }
    }

    /// Write the collection file atomically
    ///
    /// Mutations stage the new state, persist it, and only then update memory,
    /// so a failed write leaves the collection as it was.
    fn persist(&self, file: &CollectionFile) -> Result<()> {
        let json = serde_json::to_string(file)
            .map_err(|e| RagError::persistence(&self.path, e))?;

        let temp_path = self.path.with_extension("tmp");
        let write_file = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        };

        write_file().map_err(|e| {
            warn!("Failed to persist collection '{}': {}", self.name, e);
            RagError::persistence(&self.path, e)
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CollectionInner>> {
        self.inner
            .read()
            .map_err(|_| RagError::Backend("collection lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CollectionInner>> {
        self.inner
            .write()
            .map_err(|_| RagError::Backend("collection lock poisoned".to_string()))
    }
}

impl VectorBackend for CollectionStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Collection
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.read().ok().and_then(|inner| inner.dimension)
    }

    fn add_vectors(&self, vectors: Vec<Vec<f32>>, metadata: Vec<Value>) -> Result<Vec<String>> {
        let mut inner = self.write()?;
        let metadata = validate_batch(&vectors, metadata, inner.dimension)?;
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        let dimension = inner.dimension.or_else(|| vectors.first().map(Vec::len));

        let mut records = inner.records.clone();
        let mut positions = inner.positions.clone();
        let mut next_seq = inner.next_seq;
        let mut ids = Vec::with_capacity(vectors.len());
        let mut replaced = false;

        for (embedding, metadata) in vectors.into_iter().zip(metadata) {
            let id = record_id(&metadata, next_seq);
            next_seq += 1;

            if let Some(pos) = positions.remove(&id) {
                records.remove(pos);
                positions = records
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (r.id.clone(), i))
                    .collect();
                replaced = true;
            }
            positions.insert(id.clone(), records.len());
            records.push(VectorRecord {
                id: id.clone(),
                embedding,
                metadata,
            });
            ids.push(id);
        }

        let file = self.staged(dimension, next_seq, records);
        self.persist(&file)?;

        if replaced || file.records.len() > inner.capacity {
            inner.commit(file);
        } else {
            let inner = &mut *inner;
            let first_new_slot = inner.records.len();
            inner.dimension = file.dimension;
            inner.next_seq = file.next_seq;
            inner.records = file.records;
            inner.positions = positions;
            inner.index.set_searching_mode(false);
            for slot in first_new_slot..inner.records.len() {
                inner.index.insert((&inner.records[slot].embedding, slot));
            }
            inner.index.set_searching_mode(true);
        }

        debug!(
            "Collection '{}' added {} vectors, total {}",
            self.name,
            ids.len(),
            inner.records.len()
        );
        Ok(ids)
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let inner = self.read()?;
        if inner.records.is_empty() {
            return Ok(Vec::new());
        }

        let k = top_k.min(inner.records.len());
        let ef_search = (k * 2).max(50);
        let neighbours: Vec<Neighbour> = inner.index.search(query, k, ef_search);

        Ok(neighbours
            .into_iter()
            .filter_map(|n| {
                inner.records.get(n.d_id).map(|record| RetrievalResult {
                    id: record.id.clone(),
                    distance: n.distance,
                    metadata: record.metadata.clone(),
                })
            })
            .take(k)
            .collect())
    }

    fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut inner = self.write()?;
        let records: Vec<VectorRecord> = inner
            .records
            .iter()
            .filter(|r| !ids.contains(&r.id))
            .cloned()
            .collect();
        let removed = inner.records.len() - records.len();
        if removed > 0 {
            let file = self.staged(inner.dimension, inner.next_seq, records);
            self.persist(&file)?;
            inner.commit(file);
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        let file = self.staged(inner.dimension, inner.next_seq, Vec::new());
        self.persist(&file)?;
        inner.commit(file);
        info!("Cleared collection '{}'", self.name);
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}
