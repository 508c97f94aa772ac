// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use super::types::{ChatSession, SessionSummary};
use crate::rag::errors::{RagError, Result};

/// Trait for session storage backends
pub trait SessionStorage: Send + Sync {
    /// Save a session, overwriting any previous save for the same id
    fn save(&self, session: &ChatSession) -> Result<()>;

    /// Load a session, `None` when no record exists
    fn load(&self, session_id: &Uuid) -> Result<Option<ChatSession>>;

    /// Summaries of all readable sessions, in no particular order
    fn list(&self) -> Result<Vec<SessionSummary>>;

    /// Delete a session, returning whether it existed
    fn delete(&self, session_id: &Uuid) -> Result<bool>;

    /// Where sessions are persisted, if anywhere
    fn location(&self) -> Option<PathBuf> {
        None
    }
}

/// File-based storage: one pretty-printed `<session_id>.json` per session
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    base_path: PathBuf,
}

impl FileSessionStorage {
    /// Create storage rooted at `base_path`, creating the directory if needed
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).map_err(|e| RagError::persistence(&base_path, e))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn session_path(&self, session_id: &Uuid) -> PathBuf {
        self.base_path.join(format!("{}.json", session_id))
    }

    fn read_session(path: &Path) -> Result<ChatSession> {
        let contents = fs::read_to_string(path).map_err(|e| RagError::persistence(path, e))?;
        serde_json::from_str(&contents).map_err(|e| RagError::persistence(path, e))
    }
}

impl SessionStorage for FileSessionStorage {
    fn save(&self, session: &ChatSession) -> Result<()> {
        let path = self.session_path(&session.session_id);
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| RagError::persistence(&path, e))?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("tmp");
        let write_file = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)
        };

        write_file().map_err(|e| RagError::persistence(&path, e))
    }

    fn load(&self, session_id: &Uuid) -> Result<Option<ChatSession>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_session(&path).map(Some)
    }

    fn list(&self) -> Result<Vec<SessionSummary>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let entries =
            fs::read_dir(&self.base_path).map_err(|e| RagError::persistence(&self.base_path, e))?;

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match Self::read_session(&path) {
                Ok(session) => sessions.push(session.summary()),
                Err(e) => warn!("Skipping unreadable session file {:?}: {}", path, e),
            }
        }

        Ok(sessions)
    }

    fn delete(&self, session_id: &Uuid) -> Result<bool> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| RagError::persistence(&path, e))?;
        Ok(true)
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.base_path.clone())
    }
}

/// In-memory storage for tests and ephemeral use
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    sessions: Mutex<HashMap<Uuid, ChatSession>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, ChatSession>>> {
        self.sessions
            .lock()
            .map_err(|_| RagError::Backend("session storage lock poisoned".to_string()))
    }
}

impl SessionStorage for InMemorySessionStorage {
    fn save(&self, session: &ChatSession) -> Result<()> {
        self.lock()?.insert(session.session_id, session.clone());
        Ok(())
    }

    fn load(&self, session_id: &Uuid) -> Result<Option<ChatSession>> {
        Ok(self.lock()?.get(session_id).cloned())
    }

    fn list(&self) -> Result<Vec<SessionSummary>> {
        Ok(self.lock()?.values().map(ChatSession::summary).collect())
    }

    fn delete(&self, session_id: &Uuid) -> Result<bool> {
        Ok(self.lock()?.remove(session_id).is_some())
    }
}
