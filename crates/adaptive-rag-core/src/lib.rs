//! # adaptive-rag core
//!
//! Runtime-agnostic logic for adaptive-rag: token counting and chunking,
//! the document corpus, the vector index, context assembly, prompt
//! construction, and the gateway traits the application implements.
//!
//! This crate contains no tokio, HTTP, or configuration code. Locking is
//! `std::sync` only; anything that awaits a gateway while holding state
//! belongs in the application crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`tokens`] | `TokenCounter`, tokenizers, overlapping windows |
//! | [`corpus`] | `CorpusManager`: documents, token total, threshold crossing |
//! | [`index`] | `VectorIndex`: normalized vectors, top-k search, snapshots |
//! | [`context`] | Greedy budgeted context assembly and fill metrics |
//! | [`prompt`] | System prompt, query rewriting with fallback |
//! | [`embedding`] | `EmbeddingGateway` trait and vector helpers |
//! | [`completion`] | `CompletionGateway` trait |
//! | [`models`] | `Document`, `DocumentChunk`, `ChatMessage`, `Mode` |
//! | [`error`] | `CoreError` taxonomy |

pub mod completion;
pub mod context;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod prompt;
pub mod tokens;

pub use error::{CoreError, Result};
