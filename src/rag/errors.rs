// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for context retrieval, prompt assembly and session history
//!
//! Errors are grouped by who can act on them:
//! - Configuration errors (bad or missing options, fatal to the operation)
//! - Caller data errors (dimension mismatch, invalid input, never retried)
//! - Lifecycle errors (store not initialized, no embedder configured)
//! - Session lookups that miss (recoverable, caller picks a fallback)
//! - Persistence failures (surfaced, in-memory state is kept)

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Errors raised by the retrieval engine
#[derive(Error, Debug)]
pub enum RagError {
    /// Bad or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector length does not match the store dimension
    #[error("Dimension mismatch: expected {expected}D, got {actual}D")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller supplied data the engine cannot accept
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vector store used before `initialize`
    #[error("Vector store not initialized")]
    NotInitialized,

    /// Text-based call without an embedding function
    #[error("No embedding function configured")]
    EncoderNotReady,

    /// Session (or other keyed record) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O or serialization failure while saving or loading
    #[error("Persistence failure at {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    /// Embedding collaborator failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Generation collaborator failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Index backend failed internally
    #[error("Vector backend error: {0}")]
    Backend(String),
}

impl RagError {
    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        RagError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get user-friendly error message for front ends
    pub fn user_message(&self) -> String {
        match self {
            RagError::DimensionMismatch { expected, actual } => {
                format!(
                    "Vector has {} dimensions but this store holds {}-dimensional vectors",
                    actual, expected
                )
            }
            RagError::NotInitialized => {
                "The vector store has not been initialized yet".to_string()
            }
            RagError::EncoderNotReady => {
                "Text search is unavailable: no embedding model is configured".to_string()
            }
            RagError::NotFound(what) => format!("{} does not exist", what),
            RagError::Persistence { .. } => {
                "Could not save or load data; the current session is kept in memory".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            RagError::Config(_) => "CONFIG_ERROR",
            RagError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            RagError::InvalidInput(_) => "INVALID_INPUT",
            RagError::NotInitialized => "NOT_INITIALIZED",
            RagError::EncoderNotReady => "ENCODER_NOT_READY",
            RagError::NotFound(_) => "NOT_FOUND",
            RagError::Persistence { .. } => "PERSISTENCE_FAILURE",
            RagError::Embedding(_) => "EMBEDDING_FAILED",
            RagError::Generation(_) => "GENERATION_FAILED",
            RagError::Backend(_) => "BACKEND_ERROR",
        }
    }

    /// Check if the caller can reasonably recover (fall back or retry on its own terms)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RagError::NotFound(_)
                | RagError::Persistence { .. }
                | RagError::Embedding(_)
                | RagError::Generation(_)
        )
    }
}
