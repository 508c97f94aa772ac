// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PromptConfig;
use crate::session::ChatMessage;
use crate::vector::RetrievalResult;

/// Context block used when retrieval found nothing
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found.";

const CONTEXT_HEADER: &str = "Relevant Documents:";
const HISTORY_HEADER: &str = "Previous conversation:";

const PREAMBLE: &str = "You are an intelligent research assistant. You have access to relevant \
documents and should give accurate, well-informed answers based on the provided context.";

const CLOSING: &str = "Please provide a helpful response based on the documents provided above. \
If the context does not contain enough information to fully answer the question, say so and \
suggest what additional information might help.";

/// First `max_chars` characters of `text`, never splitting a character
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Deterministic prompt builder
///
/// `build` is pure: identical inputs always produce byte-identical output, and the
/// query is always included verbatim.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Assemble a prompt
    ///
    /// # Arguments
    /// * `query` - Current user question, never truncated
    /// * `docs` - Retrieved documents in rank order
    /// * `history` - Full session history; only the last `context_window` messages are used
    pub fn build(&self, query: &str, docs: &[RetrievalResult], history: &[ChatMessage]) -> String {
        let mut context = self.format_context(docs);
        let mut history_block = self.format_history(history);

        let estimated = char_len(query)
            + char_len(&context)
            + char_len(&history_block)
            + self.config.system_prompt_overhead;

        if estimated > self.config.max_prompt_chars {
            warn!(
                "Prompt too long ({} chars, budget {}), reducing context",
                estimated, self.config.max_prompt_chars
            );
            if char_len(&context) > self.config.context_cap_chars {
                context = format!(
                    "{}\n... [context truncated]",
                    truncate_chars(&context, self.config.context_cap_chars)
                );
            }
            if char_len(&history_block) > self.config.history_cap_chars {
                history_block = format!(
                    "{}\n... [history truncated]",
                    truncate_chars(&history_block, self.config.history_cap_chars)
                );
            }
        }

        debug!(
            "Assembled prompt from {} documents and {} history messages",
            docs.len(),
            history.len().min(self.config.context_window)
        );

        format!(
            "{}\n\n{}\n\n{}\n\nCurrent question: {}\n\n{}",
            PREAMBLE, context, history_block, query, CLOSING
        )
    }

    /// Render retrieved documents, or the sentinel when there are none
    pub fn format_context(&self, docs: &[RetrievalResult]) -> String {
        if docs.is_empty() {
            return NO_CONTEXT_SENTINEL.to_string();
        }

        let mut parts = Vec::with_capacity(docs.len() + 1);
        parts.push(CONTEXT_HEADER.to_string());

        for (i, doc) in docs.iter().enumerate() {
            let metadata = &doc.metadata;
            let title = metadata
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Title");
            let source = metadata
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let authors = format_authors(metadata.get("authors"));

            let abstract_text = metadata
                .get("abstract")
                .and_then(Value::as_str)
                .unwrap_or("");
            let abstract_text = if char_len(abstract_text) > self.config.abstract_limit_chars {
                format!(
                    "{}...",
                    truncate_chars(abstract_text, self.config.abstract_limit_chars)
                )
            } else {
                abstract_text.to_string()
            };

            parts.push(format!(
                "\nDocument {}: {}\nAuthors: {}\nSource: {}\nAbstract: {}\n",
                i + 1,
                title,
                authors,
                source,
                abstract_text
            ));
        }

        parts.join("\n")
    }

    /// Render the last `context_window` messages, or an empty string
    pub fn format_history(&self, history: &[ChatMessage]) -> String {
        let start = history.len().saturating_sub(self.config.context_window);
        let recent = &history[start..];
        if recent.is_empty() {
            return String::new();
        }

        let mut parts = Vec::with_capacity(recent.len() + 1);
        parts.push(HISTORY_HEADER.to_string());

        for message in recent {
            let content = if char_len(&message.content) > self.config.message_limit_chars {
                format!(
                    "{}... [truncated]",
                    truncate_chars(&message.content, self.config.message_limit_chars)
                )
            } else {
                message.content.clone()
            };
            parts.push(format!("{}: {}", message.role.label(), content));
        }

        parts.join("\n")
    }
}

fn format_authors(authors: Option<&Value>) -> String {
    match authors {
        Some(Value::Array(list)) => {
            let names: Vec<&str> = list.iter().filter_map(Value::as_str).collect();
            if names.is_empty() {
                "Unknown Authors".to_string()
            } else {
                names.join(", ")
            }
        }
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => "Unknown Authors".to_string(),
    }
}
