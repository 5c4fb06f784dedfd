//! Token counting and overlapping-window chunking.
//!
//! All budget arithmetic in adaptive-rag is expressed in tokens produced
//! by a [`Tokenizer`]. The tokenizer is treated as a deterministic black
//! box: the same text always encodes to the same token sequence.
//!
//! # Windowing Algorithm
//!
//! 1. Encode the whole text once.
//! 2. Starting at offset 0, take up to `max_tokens` tokens and decode them.
//! 3. If the window reached the end of the stream, stop.
//! 4. Otherwise restart at `window_end - overlap_tokens`.
//!
//! `overlap_tokens < max_tokens` is required so that the start offset
//! strictly increases; [`ChunkingParams::validate`] rejects anything else.
//!
//! # Example
//!
//! ```rust
//! use adaptive_rag_core::tokens::{ChunkingParams, TokenCounter};
//!
//! let counter = TokenCounter::chars();
//! let text = "a".repeat(1200);
//! let starts: Vec<usize> = counter
//!     .chunk(&text, ChunkingParams::new(500, 50))
//!     .unwrap()
//!     .map(|w| w.start)
//!     .collect();
//! assert_eq!(starts, vec![0, 450, 900]);
//! ```

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::{CoreError, Result};

/// Encoding used by gpt-4o family models.
pub const DEFAULT_ENCODING: &str = "o200k_base";

/// Deterministic text ⇄ token mapping.
pub trait Tokenizer: Send + Sync {
    /// Encoding identifier (e.g. `"o200k_base"`).
    fn name(&self) -> &str;
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> String;
}

/// Byte-pair encoding backed by `tiktoken-rs`.
pub struct BpeTokenizer {
    name: String,
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Load one of the bundled encodings: `o200k_base` or `cl100k_base`.
    pub fn for_encoding(encoding: &str) -> Result<Self> {
        let bpe = match encoding {
            "o200k_base" => tiktoken_rs::o200k_base(),
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            other => {
                return Err(CoreError::invalid(format!(
                    "unknown tokenizer encoding: {}",
                    other
                )))
            }
        }
        .map_err(|e| CoreError::contract(format!("failed to load {}: {}", encoding, e)))?;

        Ok(Self {
            name: encoding.to_string(),
            bpe,
        })
    }
}

impl Tokenizer for BpeTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[u32]) -> String {
        match self.bpe.decode(tokens.to_vec()) {
            Ok(text) => text,
            // A window edge can split a multi-byte character.
            Err(_) => tokens
                .iter()
                .map(|t| {
                    self.bpe
                        .decode(vec![*t])
                        .unwrap_or_else(|_| char::REPLACEMENT_CHARACTER.to_string())
                })
                .collect(),
        }
    }
}

/// One token per Unicode scalar value.
///
/// Exact and dependency-free; used for offline runs and for tests that
/// need predictable token counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn name(&self) -> &str {
        "char"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        tokens
            .iter()
            .map(|t| char::from_u32(*t).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

/// Window size and overlap, both in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl ChunkingParams {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(CoreError::invalid("max_tokens must be > 0"));
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(CoreError::invalid(format!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                self.overlap_tokens, self.max_tokens
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self::new(500, 50)
    }
}

/// A decoded window of the token stream: tokens `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenWindow {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl TokenWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Single-pass iterator over the windows of one text.
pub struct TokenWindows<'a> {
    tokenizer: &'a dyn Tokenizer,
    tokens: Vec<u32>,
    params: ChunkingParams,
    next_start: Option<usize>,
}

impl Iterator for TokenWindows<'_> {
    type Item = TokenWindow;

    fn next(&mut self) -> Option<TokenWindow> {
        let start = self.next_start?;
        let end = (start + self.params.max_tokens).min(self.tokens.len());
        let text = self.tokenizer.decode(&self.tokens[start..end]);

        self.next_start = if end >= self.tokens.len() {
            None
        } else {
            Some(end - self.params.overlap_tokens)
        };

        Some(TokenWindow { start, end, text })
    }
}

/// Counts tokens and produces overlapping chunks with a fixed tokenizer.
#[derive(Clone)]
pub struct TokenCounter {
    tokenizer: Arc<dyn Tokenizer>,
}

impl TokenCounter {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    /// Counter backed by a named encoding; `"char"` selects [`CharTokenizer`].
    pub fn for_encoding(encoding: &str) -> Result<Self> {
        if encoding == "char" {
            return Ok(Self::chars());
        }
        Ok(Self::new(Arc::new(BpeTokenizer::for_encoding(encoding)?)))
    }

    pub fn chars() -> Self {
        Self::new(Arc::new(CharTokenizer))
    }

    pub fn encoding(&self) -> &str {
        self.tokenizer.name()
    }

    pub fn count(&self, text: &str) -> usize {
        self.tokenizer.encode(text).len()
    }

    /// Split `text` into overlapping windows.
    ///
    /// Fails with [`CoreError::InvalidInput`] before tokenizing if the
    /// parameters would not make progress. Empty text yields no windows.
    pub fn chunk(&self, text: &str, params: ChunkingParams) -> Result<TokenWindows<'_>> {
        params.validate()?;
        let tokens = self.tokenizer.encode(text);
        let next_start = if tokens.is_empty() { None } else { Some(0) };
        Ok(TokenWindows {
            tokenizer: self.tokenizer.as_ref(),
            tokens,
            params,
            next_start,
        })
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &self.tokenizer.name())
            .finish()
    }
}
