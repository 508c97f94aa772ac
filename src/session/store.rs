// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use tracing::{info, warn};
use uuid::Uuid;

use super::storage::{FileSessionStorage, InMemorySessionStorage, SessionStorage};
use super::types::{ChatMessage, ChatSession, Role, SessionDetails, SessionSummary};
use crate::config::SessionConfig;
use crate::rag::errors::{RagError, Result};
use crate::vector::RetrievalResult;

/// Conversation history manager
///
/// Owns at most one current session; any number may exist in storage. Appends
/// go to the current session and are persisted immediately when auto-save is on.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    auto_save: bool,
    current: Option<ChatSession>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("location", &self.storage.location())
            .field("auto_save", &self.auto_save)
            .field("current", &self.current.as_ref().map(|s| s.session_id))
            .finish()
    }
}

impl SessionStore {
    pub fn new(storage: Box<dyn SessionStorage>, auto_save: bool) -> Self {
        Self {
            storage,
            auto_save,
            current: None,
        }
    }

    /// File-backed store from configuration
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let storage = FileSessionStorage::new(&config.save_dir)?;
        Ok(Self::new(Box::new(storage), config.auto_save))
    }

    /// Store that never touches disk
    pub fn in_memory(auto_save: bool) -> Self {
        Self::new(Box::new(InMemorySessionStorage::new()), auto_save)
    }

    pub fn auto_save(&self) -> bool {
        self.auto_save
    }

    /// Start a fresh session and make it current
    pub fn start_new_session(&mut self, topic: Option<String>) -> &ChatSession {
        let session = ChatSession::new(topic);
        info!("Started new chat session: {}", session.session_id);
        self.current.insert(session)
    }

    /// Load a persisted session and make it current
    ///
    /// Returns `Ok(None)` when no session with this id exists, leaving the
    /// current session unchanged.
    pub fn load_session(&mut self, session_id: &Uuid) -> Result<Option<&ChatSession>> {
        match self.storage.load(session_id)? {
            Some(session) => {
                info!("Loaded chat session: {}", session_id);
                let session: &ChatSession = self.current.insert(session);
                Ok(Some(session))
            }
            None => {
                warn!("Session not found: {}", session_id);
                Ok(None)
            }
        }
    }

    /// Persist a session, overwriting any earlier save
    pub fn save_session(&self, session: &ChatSession) -> Result<()> {
        self.storage.save(session).map_err(|e| {
            warn!("Failed to save session {}: {}", session.session_id, e);
            e
        })?;
        info!("Saved chat session: {}", session.session_id);
        Ok(())
    }

    /// Persist the current session
    pub fn save_current(&self) -> Result<()> {
        let session = self
            .current
            .as_ref()
            .ok_or_else(|| RagError::InvalidInput("no active session to save".to_string()))?;
        self.save_session(session)
    }

    /// Append a message to the current session
    ///
    /// Starts a session if none is active, then saves when auto-save is on. If the
    /// save fails the message stays in memory and the error is returned.
    pub fn append_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        retrieved_context: Option<Vec<RetrievalResult>>,
    ) -> Result<()> {
        if self.current.is_none() {
            warn!("No active session, creating new one");
            self.start_new_session(None);
        }

        let mut message = ChatMessage::new(role, content);
        message.retrieved_context = retrieved_context;

        if let Some(session) = self.current.as_mut() {
            session.push(message);
        }

        if self.auto_save {
            self.save_current()?;
        }
        Ok(())
    }

    /// All readable persisted sessions, most recently updated first
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions = self.storage.list()?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// Delete a persisted session
    ///
    /// Clears the current session too when it is the one deleted.
    ///
    /// # Errors
    /// * `NotFound` if no persisted session has this id
    pub fn delete_session(&mut self, session_id: &Uuid) -> Result<()> {
        if !self.storage.delete(session_id)? {
            warn!("Session not found: {}", session_id);
            return Err(RagError::NotFound(format!("session {}", session_id)));
        }
        if self.current.as_ref().map(|s| &s.session_id) == Some(session_id) {
            self.current = None;
        }
        info!("Deleted chat session: {}", session_id);
        Ok(())
    }

    pub fn current_session(&self) -> Option<&ChatSession> {
        self.current.as_ref()
    }

    /// Ordered messages of the current session (empty when there is none)
    pub fn history(&self) -> &[ChatMessage] {
        self.current
            .as_ref()
            .map(|s| s.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Counts and last message of the current session
    pub fn session_summary(&self) -> Option<SessionDetails> {
        self.current.as_ref().map(ChatSession::details)
    }
}
