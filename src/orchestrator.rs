//! Request-level pipeline: upload, lazy index rebuild, and chat.
//!
//! [`RetrievalOrchestrator`] owns the corpus, the vector index, and the two
//! gateways. The operating mode is never stored; it is derived from the
//! corpus token total at the start of each request.
//!
//! # Index lifecycle
//!
//! ```text
//!            rebuild (retrieval mode, chat request)
//!   Empty ───────────────────────────────────────────▶ Populated
//!     ▲                                                    │
//!     └────────── remove / clear / rebuild failure ────────┘
//! ```
//!
//! The rebuild holds the index write lock across the embedding call, so
//! concurrent chats that find the index empty wait for the first rebuild
//! and then observe `Populated`. Uploads never touch the index.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use adaptive_rag_core::completion::{CompletionGateway, CompletionRequest};
use adaptive_rag_core::context::{assemble, AssembledContext, ContextMetrics, RetrievedChunk};
use adaptive_rag_core::corpus::{AddOutcome, CorpusManager};
use adaptive_rag_core::embedding::{embed_one, EmbeddingGateway};
use adaptive_rag_core::index::VectorIndex;
use adaptive_rag_core::models::{ChatMessage, Document, IndexState, Mode};
use adaptive_rag_core::prompt::{answer_messages, rewrite_query, RewriteSettings};
use adaptive_rag_core::tokens::TokenCounter;
use adaptive_rag_core::{CoreError, Result};

use crate::completion::create_completer;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract;

/// Knobs for retrieval and answer generation.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_context_tokens: usize,
    pub answer_model: String,
    pub answer_temperature: f32,
    pub answer_max_tokens: u32,
    pub rewrite: RewriteSettings,
}

impl RetrievalSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            max_context_tokens: config.retrieval.max_context_tokens,
            answer_model: config.completion.model.clone(),
            answer_temperature: config.completion.temperature,
            answer_max_tokens: config.completion.max_tokens,
            rewrite: config.rewrite_settings(),
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of one chat request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutcome {
    pub response: String,
    pub mode: Mode,
    /// Corpus token total at answer time.
    pub token_count: usize,
    pub relevant_chunks_count: usize,
    pub relevant_chunks: Vec<RetrievedChunk>,
    /// Tokens in the rendered context text; 0 when it is empty.
    pub context_tokens_used: usize,
    pub context_metrics: ContextMetrics,
    /// The retrieval query; `None` in full-context mode.
    pub enhanced_query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub total_documents: usize,
    pub total_tokens: usize,
    pub current_mode: Mode,
    pub token_threshold: usize,
    pub vector_store_size: usize,
    pub index_state: IndexState,
    pub context_metrics: ContextMetrics,
}

pub struct RetrievalOrchestrator {
    corpus: Arc<CorpusManager>,
    index: RwLock<VectorIndex>,
    embedder: Arc<dyn EmbeddingGateway>,
    completer: Arc<dyn CompletionGateway>,
    settings: RetrievalSettings,
    snapshot_path: Option<PathBuf>,
}

impl RetrievalOrchestrator {
    /// The index dimension is taken from `embedder.dims()`.
    pub fn new(
        corpus: Arc<CorpusManager>,
        embedder: Arc<dyn EmbeddingGateway>,
        completer: Arc<dyn CompletionGateway>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            index: RwLock::new(VectorIndex::new(embedder.dims())),
            corpus,
            embedder,
            completer,
            settings,
            snapshot_path: None,
        }
    }

    /// Save the index under `base` after every successful rebuild.
    pub fn with_snapshot_path(mut self, base: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(base.into());
        self
    }

    /// Wire up tokenizer, corpus, and gateways from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let counter = TokenCounter::for_encoding(&config.tokenizer.encoding)?;
        let corpus = CorpusManager::new(
            counter,
            config.chunking.params(),
            config.corpus.token_threshold,
        )?;
        let embedder = create_embedder(&config.embedding)?;
        let completer = create_completer(&config.completion)?;

        let mut orchestrator = Self::new(
            Arc::new(corpus),
            embedder,
            completer,
            RetrievalSettings::from_config(config),
        );
        if let Some(path) = &config.index.snapshot_path {
            orchestrator = orchestrator.with_snapshot_path(path);
        }
        Ok(orchestrator)
    }

    pub fn corpus(&self) -> &CorpusManager {
        &self.corpus
    }

    pub fn current_mode(&self) -> Mode {
        self.corpus.mode()
    }

    pub async fn index_state(&self) -> IndexState {
        self.index.read().await.state()
    }

    pub async fn index_size(&self) -> usize {
        self.index.read().await.len()
    }

    /// Extract text from an uploaded file and add it to the corpus.
    pub fn upload(&self, filename: &str, bytes: &[u8]) -> Result<AddOutcome> {
        extract::check_supported(filename)?;
        let text = extract::extract_text(bytes, filename)?;
        Ok(self.corpus.ingest(filename, text))
    }

    pub fn get(&self, id: &str) -> Result<Document> {
        self.corpus
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("document {}", id)))
    }

    /// Remove one document. The index is cleared so the next retrieval
    /// request rebuilds from the remaining corpus.
    pub async fn remove(&self, id: &str) -> Result<()> {
        if !self.corpus.remove(id) {
            return Err(CoreError::NotFound(format!("document {}", id)));
        }
        self.index.write().await.clear();
        Ok(())
    }

    pub async fn clear(&self) {
        self.corpus.clear();
        self.index.write().await.clear();
        info!("corpus and index cleared");
    }

    /// Populate the index if `mode` is retrieval and the index is empty.
    /// Returns the resulting state.
    pub async fn ensure_index(&self, mode: Mode) -> Result<IndexState> {
        if mode != Mode::Retrieval {
            return Ok(self.index_state().await);
        }
        if self.index_state().await == IndexState::Populated {
            return Ok(IndexState::Populated);
        }

        let mut index = self.index.write().await;
        // Another request may have rebuilt while this one waited.
        if index.state() == IndexState::Populated {
            return Ok(IndexState::Populated);
        }
        self.rebuild_locked(&mut index).await
    }

    async fn rebuild_locked(&self, index: &mut VectorIndex) -> Result<IndexState> {
        index.clear();
        let chunks = self.corpus.chunk_all()?;
        if chunks.is_empty() {
            return Ok(IndexState::Empty);
        }

        info!(chunks = chunks.len(), "rebuilding vector index");
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await.map_err(|e| {
            error!(error = %e, "embedding batch failed");
            CoreError::gateway(&e)
        })?;
        if embeddings.len() != chunks.len() {
            return Err(CoreError::contract(format!(
                "embedding gateway returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        index.add(chunks, embeddings).map_err(|e| match e {
            CoreError::InvalidInput(msg) => CoreError::Contract(msg),
            other => other,
        })?;
        info!(chunks = index.len(), "vector index rebuilt");

        if let Some(base) = &self.snapshot_path {
            self.save_snapshot(index.clone(), base.clone()).await;
        }
        Ok(index.state())
    }

    /// Write `index` to `base` on the blocking pool. Failures are logged.
    async fn save_snapshot(&self, index: VectorIndex, base: PathBuf) {
        let path = base.clone();
        match tokio::task::spawn_blocking(move || index.save(&path)).await {
            Ok(Ok(())) => info!(path = %base.display(), "index snapshot saved"),
            Ok(Err(e)) => warn!(path = %base.display(), error = %e, "failed to save index snapshot"),
            Err(e) => warn!(path = %base.display(), error = %e, "snapshot task failed"),
        }
    }

    /// Answer `message` given the prior conversation.
    pub async fn chat(&self, message: &str, history: &[ChatMessage]) -> Result<ChatOutcome> {
        if message.trim().is_empty() {
            return Err(CoreError::invalid("message must not be empty"));
        }

        let mode = self.current_mode();
        let (context, enhanced_query) = match mode {
            Mode::FullContext => (AssembledContext::full(self.corpus.all_content()), None),
            Mode::Retrieval => {
                let (context, query) = self.retrieve(mode, message, history).await?;
                (context, Some(query))
            }
        };

        let request = CompletionRequest {
            model: self.settings.answer_model.clone(),
            messages: answer_messages(mode, &context.text, history, message),
            temperature: self.settings.answer_temperature,
            max_tokens: self.settings.answer_max_tokens,
        };
        let response = self.completer.complete(&request).await.map_err(|e| {
            error!(error = %e, "answer generation failed");
            CoreError::gateway(&e)
        })?;

        let context_tokens_used = if context.text.is_empty() {
            0
        } else {
            self.corpus.counter().count(&context.text)
        };

        Ok(ChatOutcome {
            response,
            mode,
            token_count: self.corpus.total_tokens(),
            relevant_chunks_count: context.chunks.len(),
            relevant_chunks: context.chunks,
            context_tokens_used,
            context_metrics: self.metrics(),
            enhanced_query,
        })
    }

    /// Rewrite the query, embed it, search, and assemble a budgeted context.
    async fn retrieve(
        &self,
        mode: Mode,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<(AssembledContext, String)> {
        self.ensure_index(mode).await?;

        let query = rewrite_query(self.completer.as_ref(), &self.settings.rewrite, message, history)
            .await
            .into_query();
        let query_vector = embed_one(self.embedder.as_ref(), &query).await.map_err(|e| {
            error!(error = %e, "query embedding failed");
            CoreError::gateway(&e)
        })?;

        let hits = self
            .index
            .read()
            .await
            .search(&query_vector, self.settings.top_k)?;
        Ok((assemble(&hits, self.settings.max_context_tokens), query))
    }

    pub fn metrics(&self) -> ContextMetrics {
        ContextMetrics::compute(
            self.corpus.total_tokens(),
            self.corpus.threshold(),
            self.settings.max_context_tokens,
        )
    }

    pub async fn status(&self) -> StatusReport {
        let index = self.index.read().await;
        StatusReport {
            total_documents: self.corpus.len(),
            total_tokens: self.corpus.total_tokens(),
            current_mode: self.current_mode(),
            token_threshold: self.corpus.threshold(),
            vector_store_size: index.len(),
            index_state: index.state(),
            context_metrics: self.metrics(),
        }
    }
}
