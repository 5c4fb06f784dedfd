//! # adaptive-rag
//!
//! Question answering over uploaded documents that picks its context
//! strategy from the size of the corpus.
//!
//! While the corpus is below `[corpus].token_threshold` tokens, every
//! document is handed to the model verbatim (**full-context** mode). At or
//! above it, documents are chunked, embedded, and searched, and only the
//! best-scoring chunks that fit the context budget are used (**rag** mode).
//! The mode is recomputed on every request, so deleting documents can move
//! the corpus back to full-context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────────────┐
//! │  upload  │──▶│ CorpusManager│──▶│ RetrievalOrchestrator│
//! │ extract  │   │ tokens/mode  │   │ index · rewrite · LLM│
//! └──────────┘   └──────────────┘   └──────────┬──────────┘
//!                                              │
//!                         ┌────────────────────┤
//!                         ▼                    ▼
//!                    ┌──────────┐        ┌──────────┐
//!                    │   CLI    │        │   HTTP   │
//!                    │  (arag)  │        │  (axum)  │
//!                    └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! arag count ./handbook.pdf         # tokens and the mode it selects
//! arag serve                        # start the HTTP API on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and env overrides |
//! | [`extract`] | PDF / Word / text extraction |
//! | [`embedding`] | OpenAI-compatible embedding gateway |
//! | [`completion`] | OpenAI-compatible chat gateway |
//! | [`orchestrator`] | Upload, lazy index rebuild, chat pipeline |
//! | [`server`] | HTTP API |
//! | [`inspect`] | Offline `count` / `chunk` / `index-info` commands |
//!
//! Token counting, the corpus, the vector index, and prompt construction
//! live in the `adaptive-rag-core` crate.

pub mod completion;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod inspect;
pub mod orchestrator;
pub mod server;
