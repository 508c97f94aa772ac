// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text generation collaborator

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::errors::Result;

/// Trait for text generation backends
///
/// Implementations wrap an external model endpoint. The engine treats output as
/// opaque text and never retries on its own.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a complete response for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate a response as incremental chunks
    ///
    /// The stream ends when the sender is dropped. An `Err` item aborts the
    /// response. The default implementation sends the full `generate` output as a
    /// single chunk.
    async fn generate_stream(&self, prompt: &str) -> Result<mpsc::Receiver<Result<String>>> {
        let text = self.generate(prompt).await?;
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 on a fresh channel, cannot be full
        let _ = tx.try_send(Ok(text));
        Ok(rx)
    }

    /// Generator name for logging
    fn name(&self) -> &'static str {
        "generator"
    }
}
