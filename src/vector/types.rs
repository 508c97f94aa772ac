// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::config::BackendKind;
use crate::rag::errors::{RagError, Result};

/// Vector with attached metadata, owned by the store that indexed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

/// Single ranked hit, ordered ascending by distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub distance: f32,
    pub metadata: Value,
}

/// Query accepted by `VectorStore::search`
#[derive(Debug, Clone, Copy)]
pub enum QueryInput<'a> {
    Vector(&'a [f32]),
    Text(&'a str),
}

impl<'a> From<&'a [f32]> for QueryInput<'a> {
    fn from(v: &'a [f32]) -> Self {
        QueryInput::Vector(v)
    }
}

impl<'a, const N: usize> From<&'a [f32; N]> for QueryInput<'a> {
    fn from(v: &'a [f32; N]) -> Self {
        QueryInput::Vector(v.as_slice())
    }
}

impl<'a> From<&'a Vec<f32>> for QueryInput<'a> {
    fn from(v: &'a Vec<f32>) -> Self {
        QueryInput::Vector(v.as_slice())
    }
}

impl<'a> From<&'a str> for QueryInput<'a> {
    fn from(s: &'a str) -> Self {
        QueryInput::Text(s)
    }
}

impl<'a> From<&'a String> for QueryInput<'a> {
    fn from(s: &'a String) -> Self {
        QueryInput::Text(s.as_str())
    }
}

/// Store statistics for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub backend: BackendKind,
    pub dimension: Option<usize>,
    pub count: usize,
    pub location: Option<PathBuf>,
}

/// Record id: the metadata's `"id"` string when present, otherwise `vec_<seq>`
pub(crate) fn record_id(metadata: &Value, seq: u64) -> String {
    metadata
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("vec_{}", seq))
}

/// Validate a batch before any of it is inserted
///
/// Returns the normalised metadata (null becomes an empty object).
pub(crate) fn validate_batch(
    vectors: &[Vec<f32>],
    metadata: Vec<Value>,
    dimension: Option<usize>,
) -> Result<Vec<Value>> {
    if vectors.len() != metadata.len() {
        return Err(RagError::InvalidInput(format!(
            "got {} vectors but {} metadata entries",
            vectors.len(),
            metadata.len()
        )));
    }

    let expected = dimension.or_else(|| vectors.first().map(Vec::len));
    for (i, vector) in vectors.iter().enumerate() {
        if let Some(expected) = expected {
            if vector.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        if vector.is_empty() {
            return Err(RagError::InvalidInput(format!("vector {} is empty", i)));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RagError::InvalidInput(format!(
                "vector {} contains NaN or Infinity",
                i
            )));
        }
    }

    metadata
        .into_iter()
        .enumerate()
        .map(|(i, meta)| match meta {
            Value::Null => Ok(Value::Object(Map::new())),
            Value::Object(_) => Ok(meta),
            _ => Err(RagError::InvalidInput(format!(
                "metadata {} must be a JSON object",
                i
            ))),
        })
        .collect()
}

/// Squared Euclidean distance
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
