// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Persistent collection backend through the VectorStore facade

use fabstir_rag_engine::{BackendKind, VectorStore, VectorStoreConfig};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn collection_config(dir: &Path, dimension: Option<usize>) -> VectorStoreConfig {
    VectorStoreConfig {
        backend: BackendKind::Collection,
        dimension,
        collection_name: "papers".to_string(),
        collection_dir: dir.to_path_buf(),
    }
}

#[test]
fn test_collection_search_ranking() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = VectorStore::new();
    store
        .initialize(&collection_config(temp_dir.path(), Some(2)))
        .unwrap();
    store
        .add_vectors(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            vec![json!({"id": "a"}), json!({"id": "b"}), json!({"id": "c"})],
        )
        .unwrap();

    let results = store.search(&[1.0f32, 0.0], 2).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert!(results[0].distance <= results[1].distance);
}

#[test]
fn test_collection_without_dimension_is_empty_until_first_insert() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = VectorStore::new();
    store.initialize(&collection_config(temp_dir.path(), None)).unwrap();

    assert_eq!(store.dimension(), None);
    assert!(store.search(&[1.0f32, 2.0, 3.0], 5).unwrap().is_empty());

    store
        .add_vectors(vec![vec![1.0, 2.0, 3.0]], vec![json!({"id": "x"})])
        .unwrap();
    assert_eq!(store.dimension(), Some(3));
    assert_eq!(
        store.search(&[1.0f32, 2.0], 1).unwrap_err().error_code(),
        "DIMENSION_MISMATCH"
    );
}

#[test]
fn test_collection_survives_reinitialize() {
    let temp_dir = TempDir::new().unwrap();
    let config = collection_config(temp_dir.path(), Some(2));
    {
        let mut store = VectorStore::new();
        store.initialize(&config).unwrap();
        store
            .add_vectors(
                vec![vec![0.0, 1.0], vec![1.0, 0.0]],
                vec![json!({"id": "up", "title": "Up"}), json!({"id": "right"})],
            )
            .unwrap();
    }

    let mut store = VectorStore::new();
    store.initialize(&config).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.backend, BackendKind::Collection);
    assert_eq!(stats.count, 2);
    assert_eq!(stats.location, Some(temp_dir.path().join("papers.json")));

    let results = store.search(&[0.0f32, 0.9], 1).unwrap();
    assert_eq!(results[0].id, "up");
    assert_eq!(results[0].metadata["title"], "Up");
}

#[test]
fn test_collection_grows_past_initial_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = VectorStore::new();
    store
        .initialize(&collection_config(temp_dir.path(), Some(2)))
        .unwrap();

    for batch in 0..3 {
        let vectors: Vec<Vec<f32>> = (0..500)
            .map(|i| vec![(batch * 500 + i) as f32, 0.0])
            .collect();
        let metadata = (0..500).map(|_| json!({})).collect();
        store.add_vectors(vectors, metadata).unwrap();
    }

    assert_eq!(store.len().unwrap(), 1500);
    let results = store.search(&[1200.0f32, 0.0], 1).unwrap();
    assert_eq!(results[0].distance, 0.0);
}
