//! Token-budgeted context assembly and fill metrics.
//!
//! # Assembly Algorithm (retrieval mode)
//!
//! 1. Walk search hits in the order returned (descending score).
//! 2. Keep a running sum of chunk token counts.
//! 3. Stop at the first chunk that would push the sum past the budget.
//!    That chunk and every lower-ranked chunk are dropped; nothing is
//!    truncated and no later, smaller chunk is tried in its place.
//! 4. Render each kept chunk as `[From <document>]\n<content>` and join
//!    with a blank line.

use serde::Serialize;

use crate::index::ScoredChunk;
use crate::models::Mode;

/// Default retrieval-mode budget, in tokens.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 100_000;

/// A chunk that made it into the context, with its retrieval score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub similarity_score: f32,
    pub document_name: String,
    pub chunk_index: usize,
    pub content: String,
    pub token_count: usize,
}

/// Output of context assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub text: String,
    /// Empty in full-context mode.
    pub chunks: Vec<RetrievedChunk>,
    /// Sum of the kept chunks' token counts.
    pub chunk_tokens: usize,
}

impl AssembledContext {
    /// Full-context mode: the whole corpus, no chunk list, no budget.
    pub fn full(text: String) -> Self {
        Self {
            text,
            chunks: Vec::new(),
            chunk_tokens: 0,
        }
    }
}

/// Greedy prefix of `hits` that fits in `max_tokens`.
pub fn assemble(hits: &[ScoredChunk], max_tokens: usize) -> AssembledContext {
    let mut parts = Vec::new();
    let mut chunks = Vec::new();
    let mut used = 0usize;

    for hit in hits {
        let chunk = &hit.chunk;
        if used + chunk.token_count > max_tokens {
            break;
        }
        used += chunk.token_count;
        parts.push(format!("[From {}]\n{}", chunk.document_name, chunk.content));
        chunks.push(RetrievedChunk {
            similarity_score: hit.score,
            document_name: chunk.document_name.clone(),
            chunk_index: chunk.chunk_index,
            content: chunk.content.clone(),
            token_count: chunk.token_count,
        });
    }

    AssembledContext {
        text: parts.join("\n\n"),
        chunks,
        chunk_tokens: used,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    DocumentLimit,
    RetrievalLimit,
}

/// How full the active limit is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMetrics {
    pub context_tokens_used: usize,
    pub max_context_tokens: usize,
    pub context_fill_percentage: f64,
    pub context_limit_type: LimitType,
    pub mode: Mode,
}

impl ContextMetrics {
    /// The limit is the mode threshold in full-context mode and the
    /// retrieval budget in retrieval mode.
    pub fn compute(total_tokens: usize, threshold: usize, max_context_tokens: usize) -> Self {
        let mode = Mode::for_tokens(total_tokens, threshold);
        let (max_tokens, limit_type) = match mode {
            Mode::FullContext => (threshold, LimitType::DocumentLimit),
            Mode::Retrieval => (max_context_tokens, LimitType::RetrievalLimit),
        };
        let fill = if max_tokens == 0 {
            100.0
        } else {
            (total_tokens as f64 / max_tokens as f64 * 100.0).min(100.0)
        };
        Self {
            context_tokens_used: total_tokens,
            max_context_tokens: max_tokens,
            context_fill_percentage: fill,
            context_limit_type: limit_type,
            mode,
        }
    }
}
