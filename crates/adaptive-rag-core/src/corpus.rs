//! In-memory document corpus with a running token total.
//!
//! [`CorpusManager`] owns every uploaded [`Document`] and keeps
//! `total_tokens` equal to the sum of their cached token counts. All
//! mutations happen under a single write guard, so readers never observe
//! a document list and a total that disagree.
//!
//! The only mode information the corpus reports is the upward crossing
//! of the threshold on [`add`](CorpusManager::add); the current mode is
//! always derived via [`Mode::for_tokens`].

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::error::Result;
use crate::models::{Document, DocumentChunk, Mode};
use crate::tokens::{ChunkingParams, TokenCounter};

/// Default corpus size, in tokens, at which retrieval mode begins.
pub const DEFAULT_TOKEN_THRESHOLD: usize = 10_000;

/// Result of inserting a document.
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub document: Document,
    /// True only on the insert that moved the corpus from below the
    /// threshold to at-or-above it.
    pub mode_switched: bool,
    pub total_tokens: usize,
}

#[derive(Default)]
struct CorpusState {
    documents: Vec<Document>,
    total_tokens: usize,
}

pub struct CorpusManager {
    state: RwLock<CorpusState>,
    counter: TokenCounter,
    chunking: ChunkingParams,
    threshold: usize,
}

impl CorpusManager {
    /// Create an empty corpus. Chunking parameters are validated here so
    /// that [`chunk_all`](Self::chunk_all) cannot fail on them later.
    pub fn new(counter: TokenCounter, chunking: ChunkingParams, threshold: usize) -> Result<Self> {
        chunking.validate()?;
        Ok(Self {
            state: RwLock::new(CorpusState::default()),
            counter,
            chunking,
            threshold,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, CorpusState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CorpusState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn chunking(&self) -> ChunkingParams {
        self.chunking
    }

    /// Count tokens in `content`, build a [`Document`], and [`add`](Self::add) it.
    pub fn ingest(&self, name: &str, content: String) -> AddOutcome {
        let token_count = self.counter.count(&content);
        self.add(Document::new(name, content, token_count))
    }

    /// Append a document and report whether this insert crossed the threshold.
    ///
    /// `was_full_context` is read before the mutation and
    /// `is_now_retrieval` after it, under the same guard.
    pub fn add(&self, document: Document) -> AddOutcome {
        let mut state = self.write();

        let was_full_context = state.total_tokens < self.threshold;
        state.total_tokens += document.token_count;
        state.documents.push(document.clone());
        let is_now_retrieval = state.total_tokens >= self.threshold;
        let mode_switched = was_full_context && is_now_retrieval;

        info!(
            id = %document.id,
            name = %document.name,
            tokens = document.token_count,
            total_tokens = state.total_tokens,
            mode_switched,
            "document added"
        );

        AddOutcome {
            document,
            mode_switched,
            total_tokens: state.total_tokens,
        }
    }

    /// Remove a document by id. Unknown ids return `false`.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.write();
        match state.documents.iter().position(|d| d.id == id) {
            Some(pos) => {
                let doc = state.documents.remove(pos);
                state.total_tokens -= doc.token_count;
                info!(id, total_tokens = state.total_tokens, "document removed");
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut state = self.write();
        state.documents.clear();
        state.total_tokens = 0;
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.read().documents.iter().find(|d| d.id == id).cloned()
    }

    /// Snapshot of all documents in insertion order.
    pub fn documents(&self) -> Vec<Document> {
        self.read().documents.clone()
    }

    pub fn len(&self) -> usize {
        self.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().documents.is_empty()
    }

    pub fn total_tokens(&self) -> usize {
        self.read().total_tokens
    }

    pub fn mode(&self) -> Mode {
        Mode::for_tokens(self.total_tokens(), self.threshold)
    }

    /// All document contents joined by a paragraph break, in insertion order.
    pub fn all_content(&self) -> String {
        let state = self.read();
        state
            .documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Chunk every document in insertion order.
    ///
    /// Chunk indices restart at 0 for each document and are contiguous.
    pub fn chunk_all(&self) -> Result<Vec<DocumentChunk>> {
        let documents = self.documents();
        let mut chunks = Vec::new();
        for doc in &documents {
            for (i, window) in self.counter.chunk(&doc.content, self.chunking)?.enumerate() {
                chunks.push(DocumentChunk {
                    id: DocumentChunk::chunk_id(&doc.id, i),
                    token_count: self.counter.count(&window.text),
                    content: window.text,
                    document_name: doc.name.clone(),
                    chunk_index: i,
                });
            }
        }
        Ok(chunks)
    }
}

impl std::fmt::Debug for CorpusManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("CorpusManager")
            .field("documents", &state.documents.len())
            .field("total_tokens", &state.total_tokens)
            .field("threshold", &self.threshold)
            .finish()
    }
}
