//! Deterministic gateways and fixtures shared by the integration tests.
//!
//! Token counts use the one-token-per-character tokenizer so sizes in the
//! tests are exact.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adaptive_rag::orchestrator::{RetrievalOrchestrator, RetrievalSettings};
use adaptive_rag_core::completion::{CompletionGateway, CompletionRequest};
use adaptive_rag_core::corpus::CorpusManager;
use adaptive_rag_core::embedding::EmbeddingGateway;
use adaptive_rag_core::tokens::{ChunkingParams, TokenCounter};

pub const REWRITE_MODEL: &str = "gpt-4o-mini";

/// Embeds text as `[1 + #a, #b, #c]`, never a zero vector.
#[derive(Default)]
pub struct StubEmbedder {
    pub batches: Mutex<Vec<usize>>,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
}

impl StubEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let count = |ch: char| text.chars().filter(|c| *c == ch).count() as f32;
    vec![1.0 + count('a'), count('b'), count('c')]
}

#[async_trait]
impl EmbeddingGateway for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub-embedding"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batches.lock().unwrap().push(texts.len());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// Answers every request; rewrite requests can be made to fail.
#[derive(Default)]
pub struct StubChat {
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub fail_rewrite: AtomicBool,
    pub rewrite_reply: Mutex<String>,
}

impl StubChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rewrite_reply: Mutex::new("standalone query".to_string()),
            ..Self::default()
        })
    }

    pub fn failing_rewrites() -> Arc<Self> {
        let chat = Self::new();
        chat.fail_rewrite.store(true, Ordering::SeqCst);
        chat
    }

    pub fn answer_requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.model != REWRITE_MODEL)
            .cloned()
            .collect()
    }

    pub fn rewrite_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.model == REWRITE_MODEL)
            .count()
    }
}

#[async_trait]
impl CompletionGateway for StubChat {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if request.model == REWRITE_MODEL {
            if self.fail_rewrite.load(Ordering::SeqCst) {
                bail!("rewrite model overloaded");
            }
            return Ok(self.rewrite_reply.lock().unwrap().clone());
        }
        Ok(format!("answer #{}", self.requests.lock().unwrap().len()))
    }
}

pub fn settings(max_context_tokens: usize) -> RetrievalSettings {
    RetrievalSettings {
        max_context_tokens,
        ..RetrievalSettings::default()
    }
}

/// Character-token orchestrator with 500/50 chunking.
pub fn orchestrator(
    threshold: usize,
    embedder: Arc<StubEmbedder>,
    chat: Arc<StubChat>,
    settings: RetrievalSettings,
) -> RetrievalOrchestrator {
    let corpus = CorpusManager::new(TokenCounter::chars(), ChunkingParams::new(500, 50), threshold)
        .expect("valid chunking");
    RetrievalOrchestrator::new(Arc::new(corpus), embedder, chat, settings)
}
