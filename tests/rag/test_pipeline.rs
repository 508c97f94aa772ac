// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// End-to-end pipeline: cache-first retrieval, generation and session recording

use async_trait::async_trait;
use fabstir_rag_engine::{
    BackendKind, EngineConfig, Generator, HashEmbedder, RagError, RagPipeline, Result, Role,
    SessionStore, VectorStore, VectorStoreConfig,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

const DIM: usize = 64;

/// Records prompts and replies with a fixed answer
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("It uses attention.".to_string())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Streams a reply word by word
struct ChunkedGenerator {
    fail_after: Option<usize>,
}

#[async_trait]
impl Generator for ChunkedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok("one two three".to_string())
    }

    async fn generate_stream(&self, _prompt: &str) -> Result<mpsc::Receiver<Result<String>>> {
        let (tx, rx) = mpsc::channel(8);
        let fail_after = self.fail_after;
        tokio::spawn(async move {
            for (i, part) in ["one ", "two ", "three"].iter().enumerate() {
                if Some(i) == fail_after {
                    let _ = tx
                        .send(Err(RagError::Generation("connection reset".to_string())))
                        .await;
                    return;
                }
                if tx.send(Ok(part.to_string())).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::Generation("backend unavailable".to_string()))
    }
}

fn populated_store() -> Arc<VectorStore> {
    let mut store = VectorStore::new().with_embedder(Arc::new(HashEmbedder::new(DIM).unwrap()));
    store
        .initialize(&VectorStoreConfig {
            backend: BackendKind::FlatIndex,
            dimension: Some(DIM),
            ..Default::default()
        })
        .unwrap();
    store
        .add_texts(
            &["transformers use attention", "diffusion models generate images"],
            Some(vec![
                json!({"id": "t", "title": "Attention Is All You Need", "abstract": "Transformers"}),
                json!({"id": "d", "title": "Denoising Diffusion", "abstract": "Diffusion"}),
            ]),
        )
        .unwrap();
    Arc::new(store)
}

fn pipeline(generator: Arc<dyn Generator>) -> RagPipeline {
    let mut config = EngineConfig::default();
    config.retrieval.top_k = 1;
    RagPipeline::new(
        &config,
        populated_store(),
        SessionStore::in_memory(true),
        generator,
    )
}

#[tokio::test]
async fn test_ask_records_exchange() {
    let generator = Arc::new(RecordingGenerator::default());
    let pipeline = pipeline(generator.clone());

    let answer = pipeline.ask("transformers use attention", true).await.unwrap();
    assert_eq!(answer.response, "It uses attention.");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(answer.retrieved_context.len(), 1);
    assert_eq!(answer.retrieved_context[0].id, "t");
    assert!(answer.prompt.contains("Document 1: Attention Is All You Need"));
    assert!(answer
        .prompt
        .contains("Current question: transformers use attention"));

    let sessions = pipeline.sessions().lock().await;
    let history = sessions.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].retrieved_context.as_ref().unwrap()[0].id, "t");
    assert_eq!(history[1].role, Role::Assistant);
    assert!(history[1].retrieved_context.is_none());
}

#[tokio::test]
async fn test_second_question_sees_history() {
    let generator = Arc::new(RecordingGenerator::default());
    let pipeline = pipeline(generator.clone());

    pipeline.ask("transformers use attention", true).await.unwrap();
    pipeline.ask("and diffusion?", true).await.unwrap();

    let prompts = generator.prompts.lock().unwrap();
    assert!(!prompts[0].contains("Previous conversation:"));
    assert!(prompts[1].contains("Human: transformers use attention"));
    assert!(prompts[1].contains("Assistant: It uses attention."));
}

#[tokio::test]
async fn test_cache_hit_on_repeat_and_bypass() {
    let pipeline = pipeline(Arc::new(RecordingGenerator::default()));

    pipeline.ask("diffusion models", true).await.unwrap();
    pipeline.ask("diffusion models", true).await.unwrap();
    let stats = pipeline.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.size, 1);

    pipeline.ask("something new", false).await.unwrap();
    let stats = pipeline.cache_stats();
    assert_eq!(stats.size, 1, "bypassing the cache must not populate it");

    pipeline.clear_cache();
    assert_eq!(pipeline.cache_stats().size, 0);
}

#[tokio::test]
async fn test_retrieve_context_explicit_top_k() {
    let pipeline = pipeline(Arc::new(RecordingGenerator::default()));
    let results = pipeline.retrieve_context("attention", Some(5)).unwrap();
    assert_eq!(results.len(), 2);

    let err = pipeline.retrieve_context("attention", Some(0)).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");
    // Failed retrievals are not cached
    assert_eq!(pipeline.cache_stats().size, 1);
}

#[tokio::test]
async fn test_generation_failure_leaves_session_untouched() {
    let pipeline = pipeline(Arc::new(FailingGenerator));
    let err = pipeline.ask("transformers", true).await.unwrap_err();
    assert_eq!(err.error_code(), "GENERATION_FAILED");
    assert!(pipeline.sessions().lock().await.history().is_empty());
}

#[tokio::test]
async fn test_streaming_collects_chunks() {
    let pipeline = pipeline(Arc::new(ChunkedGenerator { fail_after: None }));
    let mut chunks = Vec::new();

    let answer = pipeline
        .ask_streaming("transformers", true, |chunk| chunks.push(chunk.to_string()))
        .await
        .unwrap();

    assert_eq!(chunks, vec!["one ", "two ", "three"]);
    assert_eq!(answer.response, "one two three");
    let sessions = pipeline.sessions().lock().await;
    assert_eq!(sessions.history()[1].content, "one two three");
}

#[tokio::test]
async fn test_streaming_error_aborts_without_appending() {
    let pipeline = pipeline(Arc::new(ChunkedGenerator {
        fail_after: Some(1),
    }));
    let mut seen = 0;

    let err = pipeline
        .ask_streaming("transformers", true, |_| seen += 1)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "GENERATION_FAILED");
    assert_eq!(seen, 1);
    assert!(pipeline.sessions().lock().await.history().is_empty());
}

#[tokio::test]
async fn test_session_lifecycle_through_pipeline() {
    let pipeline = pipeline(Arc::new(RecordingGenerator::default()));

    let id = pipeline.start_session(Some("ml".to_string())).await;
    pipeline.ask("transformers", true).await.unwrap();

    let details = pipeline.session_summary().await.unwrap();
    assert_eq!(details.summary.session_id, id);
    assert_eq!(details.summary.message_count, 2);
    assert_eq!(details.user_messages, 1);
    assert_eq!(details.assistant_messages, 1);

    pipeline.start_session(None).await;
    let loaded = pipeline.load_session(&id).await.unwrap().unwrap();
    assert_eq!(loaded.messages.len(), 2);
    assert_eq!(pipeline.list_sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_from_config_with_collection_backend() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = EngineConfig::default();
    config.vector_store.backend = BackendKind::Collection;
    config.vector_store.dimension = Some(DIM);
    config.vector_store.collection_dir = temp_dir.path().join("vector_db");
    config.sessions.save_dir = temp_dir.path().join("chat_history");

    let pipeline = RagPipeline::from_config(
        &config,
        Arc::new(HashEmbedder::new(DIM).unwrap()),
        Arc::new(RecordingGenerator::default()),
    )
    .unwrap();
    pipeline
        .store()
        .add_texts(&["sparse attention"], None)
        .unwrap();

    let answer = pipeline.ask("sparse attention", true).await.unwrap();
    assert_eq!(answer.retrieved_context.len(), 1);

    let saved = std::fs::read_dir(temp_dir.path().join("chat_history"))
        .unwrap()
        .count();
    assert_eq!(saved, 1);
}

#[tokio::test]
async fn test_from_config_rejects_invalid_config() {
    let mut config = EngineConfig::default();
    config.cache.max_size = 0;
    let err = RagPipeline::from_config(
        &config,
        Arc::new(HashEmbedder::new(DIM).unwrap()),
        Arc::new(RecordingGenerator::default()),
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_ERROR");
}
