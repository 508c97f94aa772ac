// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt assembly from retrieved documents and chat history

pub mod assembler;

pub use assembler::{truncate_chars, PromptAssembler, NO_CONTEXT_SENTINEL};
