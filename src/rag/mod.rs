// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RAG (Retrieval-Augmented Generation) module
// Cache-first retrieval, prompt assembly and session recording around a generator

pub mod errors;
pub mod generator;
pub mod pipeline;

pub use errors::{RagError, Result};
pub use generator::Generator;
pub use pipeline::{Answer, RagPipeline};
