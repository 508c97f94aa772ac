// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// In-memory flat index: brute-force nearest neighbour over every stored vector

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::types::{record_id, squared_l2, validate_batch, RetrievalResult, VectorRecord};
use super::VectorBackend;
use crate::config::BackendKind;
use crate::rag::errors::{RagError, Result};

#[derive(Debug, Default)]
struct FlatInner {
    /// Records in insertion order
    records: Vec<VectorRecord>,
    /// id -> position in `records`
    positions: HashMap<String, usize>,
    next_seq: u64,
}

impl FlatInner {
    fn reindex(&mut self) {
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
    }
}

/// Flat (exact) vector index
/// - Squared Euclidean distance, O(N·D) per search
/// - Ties broken by insertion order, earlier wins
/// - Re-adding an id replaces the record and moves it to the end
#[derive(Debug)]
pub struct FlatIndex {
    dimension: usize,
    inner: RwLock<FlatInner>,
}

impl FlatIndex {
    /// Create an empty flat index
    ///
    /// # Arguments
    /// * `dimension` - Length every stored vector must have
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config(
                "flat index dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            inner: RwLock::new(FlatInner::default()),
        })
    }

    /// Get a stored record by id
    pub fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        let inner = self.read()?;
        Ok(inner
            .positions
            .get(id)
            .map(|&pos| inner.records[pos].clone()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, FlatInner>> {
        self.inner
            .read()
            .map_err(|_| RagError::Backend("flat index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, FlatInner>> {
        self.inner
            .write()
            .map_err(|_| RagError::Backend("flat index lock poisoned".to_string()))
    }
}

impl VectorBackend for FlatIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::FlatIndex
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn add_vectors(&self, vectors: Vec<Vec<f32>>, metadata: Vec<Value>) -> Result<Vec<String>> {
        let metadata = validate_batch(&vectors, metadata, Some(self.dimension))?;

        let mut inner = self.write()?;
        let mut ids = Vec::with_capacity(vectors.len());
        let mut replaced = false;

        for (embedding, metadata) in vectors.into_iter().zip(metadata) {
            let id = record_id(&metadata, inner.next_seq);
            inner.next_seq += 1;

            if let Some(pos) = inner.positions.remove(&id) {
                inner.records.remove(pos);
                inner.reindex();
                replaced = true;
            }

            let pos = inner.records.len();
            inner.positions.insert(id.clone(), pos);
            inner.records.push(VectorRecord {
                id: id.clone(),
                embedding,
                metadata,
            });
            ids.push(id);
        }

        debug!(
            "Flat index added {} vectors (replaced existing: {}), total {}",
            ids.len(),
            replaced,
            inner.records.len()
        );
        Ok(ids)
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let inner = self.read()?;

        let mut scored: Vec<(usize, f32)> = inner
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, squared_l2(query, &r.embedding)))
            .collect();

        // Stable sort keeps insertion order among equal distances
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| {
                let record = &inner.records[i];
                RetrievalResult {
                    id: record.id.clone(),
                    distance,
                    metadata: record.metadata.clone(),
                }
            })
            .collect())
    }

    fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut inner = self.write()?;
        let before = inner.records.len();
        inner.records.retain(|r| !ids.contains(&r.id));
        let removed = before - inner.records.len();
        if removed > 0 {
            inner.reindex();
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.records.clear();
        inner.positions.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }
}
