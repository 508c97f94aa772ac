// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat session history and persistence

pub mod storage;
pub mod store;
pub mod types;

pub use storage::{FileSessionStorage, InMemorySessionStorage, SessionStorage};
pub use store::SessionStore;
pub use types::{ChatMessage, ChatSession, Role, SessionDetails, SessionSummary};
