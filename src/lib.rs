// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cache;
pub mod cli;
pub mod config;
pub mod prompt;
pub mod rag;
pub mod session;
pub mod vector;

// Re-export main types
pub use cache::{CacheStats, Clock, ManualClock, RetrievalCache, SystemClock};
pub use config::{
    BackendKind, CacheConfig, EngineConfig, PromptConfig, RetrievalConfig, SessionConfig,
    VectorStoreConfig,
};
pub use prompt::PromptAssembler;
pub use rag::{Answer, Generator, RagError, RagPipeline, Result};
pub use session::{
    ChatMessage, ChatSession, FileSessionStorage, InMemorySessionStorage, Role, SessionDetails,
    SessionStorage, SessionStore, SessionSummary,
};
pub use vector::{
    CollectionStore, Embedder, FlatIndex, HashEmbedder, QueryInput, RetrievalResult, StoreStats,
    VectorBackend, VectorRecord, VectorStore,
};
