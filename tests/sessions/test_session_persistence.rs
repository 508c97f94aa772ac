// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// File-backed session store: persistence, listing and deletion

use fabstir_rag_engine::{
    ChatMessage, PromptAssembler, PromptConfig, RagError, RetrievalResult, Role, SessionConfig,
    SessionStore,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use uuid::Uuid;

fn file_store(dir: &TempDir, auto_save: bool) -> SessionStore {
    SessionStore::from_config(&SessionConfig {
        auto_save,
        save_dir: dir.path().join("chat_history"),
    })
    .unwrap()
}

#[test]
fn test_from_config_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let _store = file_store(&temp_dir, true);
    assert!(temp_dir.path().join("chat_history").is_dir());
}

#[test]
fn test_append_persists_and_reloads() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = file_store(&temp_dir, true);

    store.start_new_session(Some("transformers".to_string()));
    let context = vec![RetrievalResult {
        id: "p1".to_string(),
        distance: 0.3,
        metadata: json!({"title": "Attention"}),
    }];
    store
        .append_message(Role::User, "What is attention?", Some(context.clone()))
        .unwrap();
    store
        .append_message(Role::Assistant, "A weighting mechanism.", None)
        .unwrap();
    let id = store.current_session().unwrap().session_id;

    let mut reopened = file_store(&temp_dir, true);
    let session = reopened.load_session(&id).unwrap().unwrap().clone();
    assert_eq!(session.topic.as_deref(), Some("transformers"));
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].retrieved_context, Some(context));
    assert_eq!(session.messages[1].content, "A weighting mechanism.");
    assert!(session.updated_at >= session.created_at);
}

#[test]
fn test_load_missing_returns_none() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = file_store(&temp_dir, true);
    assert!(store.load_session(&Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn test_list_sorted_by_updated_at_desc() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = file_store(&temp_dir, true);

    let mut ids = Vec::new();
    for topic in ["first", "second", "third"] {
        store.start_new_session(Some(topic.to_string()));
        store.append_message(Role::User, topic, None).unwrap();
        ids.push(store.current_session().unwrap().session_id);
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    // Touch the first session again so it becomes the most recent
    store.load_session(&ids[0]).unwrap();
    store.append_message(Role::User, "again", None).unwrap();

    let listed = store.list_sessions().unwrap();
    let order: Vec<Uuid> = listed.iter().map(|s| s.session_id).collect();
    assert_eq!(order, vec![ids[0], ids[2], ids[1]]);
    assert_eq!(listed[0].message_count, 2);
    for pair in listed.windows(2) {
        assert!(pair[0].updated_at >= pair[1].updated_at);
    }
}

#[test]
fn test_list_skips_corrupt_files() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = file_store(&temp_dir, true);
    store.append_message(Role::User, "hello", None).unwrap();
    fs::write(
        temp_dir.path().join("chat_history").join("garbage.json"),
        "{\"session_id\": 42",
    )
    .unwrap();

    assert_eq!(store.list_sessions().unwrap().len(), 1);
}

#[test]
fn test_delete_session() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = file_store(&temp_dir, true);
    store.append_message(Role::User, "bye", None).unwrap();
    let id = store.current_session().unwrap().session_id;

    store.delete_session(&id).unwrap();
    assert!(store.list_sessions().unwrap().is_empty());
    assert!(store.load_session(&id).unwrap().is_none());

    let err = store.delete_session(&id).unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
    assert!(err.is_recoverable());
}

#[test]
fn test_save_is_idempotent_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = file_store(&temp_dir, false);
    store.append_message(Role::User, "one", None).unwrap();

    store.save_current().unwrap();
    store.save_current().unwrap();
    assert_eq!(store.list_sessions().unwrap().len(), 1);

    let files: Vec<_> = fs::read_dir(temp_dir.path().join("chat_history"))
        .unwrap()
        .flatten()
        .collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn test_save_failure_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = file_store(&temp_dir, true);
    store.append_message(Role::User, "kept", None).unwrap();

    // Replace the directory with a file so the next save cannot write
    let dir = temp_dir.path().join("chat_history");
    fs::remove_dir_all(&dir).unwrap();
    fs::write(&dir, "not a directory").unwrap();

    let err = store
        .append_message(Role::Assistant, "still in memory", None)
        .unwrap_err();
    assert_eq!(err.error_code(), "PERSISTENCE_FAILURE");
    assert_eq!(store.history().len(), 2);
}

#[test]
fn test_five_pairs_window_of_two() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = file_store(&temp_dir, false);
    for i in 0..5 {
        store
            .append_message(Role::User, format!("user turn {}", i), None)
            .unwrap();
        store
            .append_message(Role::Assistant, format!("assistant turn {}", i), None)
            .unwrap();
    }

    let assembler = PromptAssembler::new(PromptConfig {
        context_window: 2,
        ..Default::default()
    });
    let prompt = assembler.build("next", &[], store.history());
    assert!(prompt.contains("Human: user turn 4"));
    assert!(prompt.contains("Assistant: assistant turn 4"));
    assert!(!prompt.contains("turn 3"));
    assert_eq!(store.history().len(), 10);
}

#[test]
fn test_messages_have_timestamps_in_order() {
    let mut store = SessionStore::in_memory(false);
    store.append_message(Role::User, "a", None).unwrap();
    store.append_message(Role::Assistant, "b", None).unwrap();

    let history: &[ChatMessage] = store.history();
    assert!(history[0].timestamp <= history[1].timestamp);
}
