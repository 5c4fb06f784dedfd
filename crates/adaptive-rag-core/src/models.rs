//! Core data models: documents, chunks, chat messages, and the derived
//! operating mode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded document held by the [`CorpusManager`](crate::corpus::CorpusManager).
///
/// Immutable after creation; the only lifecycle event is removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
    /// Cached `TokenCounter::count(content)`.
    pub token_count: usize,
    pub upload_time: DateTime<Utc>,
}

impl Document {
    /// Build a document with a fresh UUID and the current time.
    pub fn new(name: impl Into<String>, content: impl Into<String>, token_count: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            content: content.into(),
            token_count,
            upload_time: Utc::now(),
        }
    }
}

/// A window of one document's token stream, decoded back to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// `<document_id>_<chunk_index>`.
    pub id: String,
    pub content: String,
    /// Denormalized name of the owning document.
    pub document_name: String,
    pub chunk_index: usize,
    pub token_count: usize,
}

impl DocumentChunk {
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{}_{}", document_id, index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation, in the shape chat-completion APIs expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Operating mode, always derived from the corpus token total.
///
/// Obtained from [`Mode::for_tokens`]; never stored alongside the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Whole corpus is handed to the model.
    #[serde(rename = "full_context")]
    FullContext,
    /// Only the top-scoring chunks are handed to the model.
    #[serde(rename = "rag")]
    Retrieval,
}

impl Mode {
    pub fn for_tokens(total_tokens: usize, threshold: usize) -> Self {
        if total_tokens >= threshold {
            Mode::Retrieval
        } else {
            Mode::FullContext
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::FullContext => "full_context",
            Mode::Retrieval => "rag",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-state view of the vector index used to drive lazy rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Empty,
    Populated,
}
