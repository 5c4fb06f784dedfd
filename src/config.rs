//! TOML configuration parsing and validation.
//!
//! Every section has defaults, so an empty file (or no file at all) yields
//! a working configuration that talks to the OpenAI API. The API key is
//! never read from the file; gateways take it from `OPENAI_API_KEY`.
//!
//! Two environment variables override the budget values after parsing:
//! `ARAG_TOKEN_THRESHOLD` and `ARAG_MAX_CONTEXT_TOKENS`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use adaptive_rag_core::context::DEFAULT_MAX_CONTEXT_TOKENS;
use adaptive_rag_core::corpus::DEFAULT_TOKEN_THRESHOLD;
use adaptive_rag_core::index::DEFAULT_DIMENSION;
use adaptive_rag_core::prompt::{RewriteSettings, DEFAULT_HISTORY_WINDOW};
use adaptive_rag_core::tokens::{ChunkingParams, DEFAULT_ENCODING};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub tokenizer: TokenizerConfig,
    pub embedding: EmbeddingConfig,
    pub completion: CompletionConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorpusConfig {
    pub token_threshold: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            token_threshold: DEFAULT_TOKEN_THRESHOLD,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let p = ChunkingParams::default();
        Self {
            max_tokens: p.max_tokens,
            overlap_tokens: p.overlap_tokens,
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams::new(self.max_tokens, self.overlap_tokens)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_context_tokens: usize,
    pub history_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TokenizerConfig {
    /// `o200k_base`, `cl100k_base`, or `char`.
    pub encoding: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `openai` or `disabled`.
    pub provider: String,
    pub model: String,
    pub dims: usize,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dims: DEFAULT_DIMENSION,
            base_url: default_base_url(),
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompletionConfig {
    /// `openai` or `disabled`.
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub enhancement_model: String,
    pub enhancement_temperature: f32,
    pub enhancement_max_tokens: u32,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        let rewrite = RewriteSettings::default();
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            enhancement_model: rewrite.model,
            enhancement_temperature: rewrite.temperature,
            enhancement_max_tokens: rewrite.max_tokens,
            base_url: default_base_url(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IndexConfig {
    /// Base path for index snapshots written after each rebuild.
    pub snapshot_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Config {
    /// Query-rewrite settings derived from `[completion]` and `[retrieval]`.
    pub fn rewrite_settings(&self) -> RewriteSettings {
        RewriteSettings {
            model: self.completion.enhancement_model.clone(),
            temperature: self.completion.enhancement_temperature,
            max_tokens: self.completion.enhancement_max_tokens,
            history_window: self.retrieval.history_window,
        }
    }

    /// Apply `ARAG_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("ARAG_TOKEN_THRESHOLD") {
            self.corpus.token_threshold = v
                .parse()
                .with_context(|| format!("ARAG_TOKEN_THRESHOLD is not an integer: {}", v))?;
        }
        if let Ok(v) = std::env::var("ARAG_MAX_CONTEXT_TOKENS") {
            self.retrieval.max_context_tokens = v
                .parse()
                .with_context(|| format!("ARAG_MAX_CONTEXT_TOKENS is not an integer: {}", v))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        // Validate chunking
        if self.chunking.max_tokens == 0 {
            bail!("chunking.max_tokens must be > 0");
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens {
            bail!(
                "chunking.overlap_tokens ({}) must be smaller than chunking.max_tokens ({})",
                self.chunking.overlap_tokens,
                self.chunking.max_tokens
            );
        }

        // Validate retrieval
        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.max_context_tokens == 0 {
            bail!("retrieval.max_context_tokens must be > 0");
        }

        match self.tokenizer.encoding.as_str() {
            "o200k_base" | "cl100k_base" | "char" => {}
            other => bail!(
                "Unknown tokenizer encoding: '{}'. Must be o200k_base, cl100k_base, or char.",
                other
            ),
        }

        // Validate gateways
        if self.embedding.is_enabled() && self.embedding.dims == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                self.embedding.provider
            );
        }
        for (section, provider) in [
            ("embedding", &self.embedding.provider),
            ("completion", &self.completion.provider),
        ] {
            match provider.as_str() {
                "disabled" | "openai" => {}
                other => bail!(
                    "Unknown {} provider: '{}'. Must be disabled or openai.",
                    section,
                    other
                ),
            }
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            bail!("completion.temperature must be in [0.0, 2.0]");
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if given, otherwise start from defaults. Environment
/// overrides and validation apply either way.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => parse_config(""),
    }
}
