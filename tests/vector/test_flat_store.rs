// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Flat index backend through the VectorStore facade

use fabstir_rag_engine::{BackendKind, RagError, VectorStore, VectorStoreConfig};
use serde_json::json;
use std::sync::Arc;

fn flat_store(dimension: usize) -> VectorStore {
    let mut store = VectorStore::new();
    store
        .initialize(&VectorStoreConfig {
            backend: BackendKind::FlatIndex,
            dimension: Some(dimension),
            ..Default::default()
        })
        .unwrap();
    store
}

fn abc_store() -> VectorStore {
    let store = flat_store(2);
    store
        .add_vectors(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            vec![json!({"id": "a"}), json!({"id": "b"}), json!({"id": "c"})],
        )
        .unwrap();
    store
}

#[test]
fn test_nearest_two_of_three() {
    let store = abc_store();
    let results = store.search(&[1.0f32, 0.0], 2).unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(results[0].distance, 0.0);
    assert_eq!(results[1].distance, 1.0);
}

#[test]
fn test_results_sorted_ascending() {
    let store = flat_store(3);
    let vectors: Vec<Vec<f32>> = (0..20)
        .map(|i| vec![i as f32 * 0.37 % 1.0, (i * 7 % 5) as f32, 1.0 / (i + 1) as f32])
        .collect();
    let metadata = (0..20).map(|i| json!({"n": i})).collect();
    store.add_vectors(vectors, metadata).unwrap();

    let results = store.search(&[0.5f32, 2.0, 0.1], 20).unwrap();
    assert_eq!(results.len(), 20);
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[test]
fn test_top_k_clamped_to_store_size() {
    let store = abc_store();
    assert_eq!(store.search(&[0.0f32, 0.0], 1).unwrap().len(), 1);
    assert_eq!(store.search(&[0.0f32, 0.0], 3).unwrap().len(), 3);
    assert_eq!(store.search(&[0.0f32, 0.0], 100).unwrap().len(), 3);
}

#[test]
fn test_empty_store_returns_nothing() {
    let store = flat_store(4);
    assert!(store.search(&[0.0f32; 4], 5).unwrap().is_empty());
}

#[test]
fn test_dimension_mismatch_rejects_whole_batch() {
    let store = abc_store();
    let err = store
        .add_vectors(
            vec![vec![0.5, 0.5], vec![0.5, 0.5, 0.5]],
            vec![json!({"id": "d"}), json!({"id": "e"})],
        )
        .unwrap_err();

    match err {
        RagError::DimensionMismatch { expected, actual } => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(store.len().unwrap(), 3);
}

#[test]
fn test_mismatched_metadata_length() {
    let store = flat_store(2);
    let err = store
        .add_vectors(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![json!({})])
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_non_finite_vectors_rejected() {
    let store = flat_store(2);
    let err = store
        .add_vectors(vec![vec![f32::INFINITY, 0.0]], vec![json!({})])
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");

    let err = store.search(&[f32::NAN, 0.0], 1).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
}

#[test]
fn test_concurrent_searches() {
    let store = Arc::new(abc_store());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || store.search(&[1.0f32, 0.0], 2).unwrap())
        })
        .collect();

    for handle in handles {
        let results = handle.join().unwrap();
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "c");
    }
}
