//! Completion gateway trait.
//!
//! A completion gateway turns an ordered message list into generated
//! text. The orchestrator uses it twice per retrieval request: once for
//! query rewriting (fast model, low temperature) and once for the answer.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::ChatMessage;

/// A single chat-completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Message list → generated text.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
